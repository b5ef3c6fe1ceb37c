//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//!
//! El resto de la aplicación sólo ve dos contratos: [`EmbeddingProvider`] y
//! [`CompletionProvider`]. `LlmManager` los implementa para Gemini y OpenAI.

use async_trait::async_trait;
use rig::completion::Prompt;
use rig::embeddings::EmbeddingModel; // <- para .embed_texts
use tracing::debug;

use crate::{
    config::{AppConfig, LlmProvider},
    errors::AppError,
};

/// Proveedor de embeddings: un identificador de modelo y una llamada por lotes.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    /// Devuelve un vector por texto, en el mismo orden.
    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, AppError>;
}

/// Proveedor de completado: una única respuesta sin streaming.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, AppError>;
}

/// Gestor de LLMs y embeddings.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub embedding_model: String,
    pub chat_model: String,
    api_key: Option<String>,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            provider: cfg.llm_provider.clone(),
            embedding_model: cfg.llm_embedding_model.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            api_key: cfg.llm_api_key.clone(),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn missing_key(&self) -> String {
        format!(
            "Falta {} en el entorno: no se puede llamar al proveedor {:?}",
            self.provider.api_key_var(),
            self.provider
        )
    }

    // ---------------------------------------------------------------------
    // EMBEDDINGS
    // ---------------------------------------------------------------------

    async fn embed_with_gemini(&self, key: &str, texts: Vec<String>) -> Result<Vec<Vec<f64>>, AppError> {
        use rig::client::EmbeddingsClient as _;
        use rig::providers::gemini;

        let client = gemini::Client::new(key);
        let model = client.embedding_model(&self.embedding_model);
        let embeddings = model
            .embed_texts(texts)
            .await
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    async fn embed_with_openai(&self, key: &str, texts: Vec<String>) -> Result<Vec<Vec<f64>>, AppError> {
        use rig::client::EmbeddingsClient as _;
        use rig::providers::openai;

        let client = openai::Client::new(key);
        let model = client.embedding_model(&self.embedding_model);
        let embeddings = model
            .embed_texts(texts)
            .await
            .map_err(|e| AppError::Embedding(e.to_string()))?;
        Ok(embeddings.into_iter().map(|e| e.vec).collect())
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    async fn complete_with_gemini(&self, key: &str, prompt: &str, temperature: f64) -> Result<String, AppError> {
        use rig::client::CompletionClient as _;
        use rig::providers::gemini;

        let client = gemini::Client::new(key);
        let agent = client
            .agent(&self.chat_model)
            .temperature(temperature)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))
    }

    async fn complete_with_openai(&self, key: &str, prompt: &str, temperature: f64) -> Result<String, AppError> {
        use rig::client::CompletionClient as _;
        use rig::providers::openai;

        let client = openai::Client::new(key);
        let agent = client
            .agent(&self.chat_model)
            .temperature(temperature)
            .build();

        agent
            .prompt(prompt)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for LlmManager {
    fn model_id(&self) -> &str {
        &self.embedding_model
    }

    async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, AppError> {
        let key = self
            .api_key()
            .ok_or_else(|| AppError::Embedding(self.missing_key()))?;
        let expected = texts.len();
        debug!("Solicitando {expected} embeddings a {:?}", self.provider);

        let vectors = match self.provider {
            LlmProvider::Gemini => self.embed_with_gemini(key, texts).await?,
            LlmProvider::OpenAI => self.embed_with_openai(key, texts).await?,
        };

        if vectors.len() != expected {
            return Err(AppError::Embedding(format!(
                "Número de embeddings ({}) distinto al número de textos ({})",
                vectors.len(),
                expected
            )));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl CompletionProvider for LlmManager {
    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, AppError> {
        let key = self.api_key().ok_or_else(|| AppError::Llm(self.missing_key()))?;
        match self.provider {
            LlmProvider::Gemini => self.complete_with_gemini(key, prompt, temperature).await,
            LlmProvider::OpenAI => self.complete_with_openai(key, prompt, temperature).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn calls_fail_without_api_key() {
        let manager = LlmManager::from_config(&AppConfig::default());
        assert_eq!(manager.model_id(), "embedding-001");

        let err = manager.embed_texts(vec!["hola".into()]).await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(ref m) if m.contains("GOOGLE_API_KEY")));

        let err = manager.complete("hola", 0.7).await.unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
