//! Carga y gestión de configuración de la aplicación (proveedor LLM, rutas y
//! parámetros del pipeline).

use std::{env, path::PathBuf, str::FromStr};

use anyhow::{anyhow, Context, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            other => Err(anyhow!("Proveedor LLM no soportado: {other}")),
        }
    }

    /// Variable de entorno que contiene la credencial del proveedor.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Self::Gemini => "GOOGLE_API_KEY",
            Self::OpenAI => "OPENAI_API_KEY",
        }
    }

    fn default_embedding_model(&self) -> &'static str {
        match self {
            Self::Gemini => "embedding-001",
            Self::OpenAI => "text-embedding-3-small",
        }
    }

    fn default_chat_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-1.5-pro",
            Self::OpenAI => "gpt-4o-mini",
        }
    }
}

/// Política para decidir si una huella cuenta como acierto de caché.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    /// Sólo es acierto si la huella coincide con la de la sesión actual.
    Session,
    /// Cualquier entrada existente en disco con esa huella es un acierto.
    Disk,
}

impl CacheLookup {
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "disk" => Ok(Self::Disk),
            other => Err(anyhow!("Política de caché no soportada: {other}")),
        }
    }
}

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_addr: String,

    pub llm_provider: LlmProvider,
    pub llm_api_key: Option<String>,
    pub llm_embedding_model: String,
    pub llm_chat_model: String,
    pub llm_temperature: f64,

    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub cache_lookup: CacheLookup,
}

impl Default for AppConfig {
    fn default() -> Self {
        let provider = LlmProvider::Gemini;
        Self {
            server_addr: "127.0.0.1:3322".to_string(),
            llm_embedding_model: provider.default_embedding_model().to_string(),
            llm_chat_model: provider.default_chat_model().to_string(),
            llm_provider: provider,
            llm_api_key: None,
            llm_temperature: 0.7,
            data_dir: PathBuf::from("data"),
            cache_dir: PathBuf::from("cache"),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 5,
            cache_lookup: CacheLookup::Session,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Igual que `from_env`, pero con una función de búsqueda inyectable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let llm_provider = match lookup("LLM_PROVIDER") {
            Some(s) => LlmProvider::from_str(&s)?,
            None => defaults.llm_provider.clone(),
        };
        let llm_api_key = lookup(llm_provider.api_key_var()).filter(|k| !k.trim().is_empty());

        let llm_embedding_model = lookup("LLM_EMBEDDING_MODEL")
            .unwrap_or_else(|| llm_provider.default_embedding_model().to_string());
        let llm_chat_model = lookup("LLM_CHAT_MODEL")
            .unwrap_or_else(|| llm_provider.default_chat_model().to_string());

        let cache_lookup = match lookup("CACHE_LOOKUP") {
            Some(s) => CacheLookup::from_str(&s)?,
            None => defaults.cache_lookup,
        };

        let cfg = Self {
            server_addr: lookup("SERVER_ADDR").unwrap_or(defaults.server_addr),
            llm_provider,
            llm_api_key,
            llm_embedding_model,
            llm_chat_model,
            llm_temperature: parse_or(&lookup, "LLM_TEMPERATURE", defaults.llm_temperature)?,
            data_dir: lookup("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            cache_dir: lookup("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir),
            chunk_size: parse_or(&lookup, "CHUNK_SIZE", defaults.chunk_size)?,
            chunk_overlap: parse_or(&lookup, "CHUNK_OVERLAP", defaults.chunk_overlap)?,
            top_k: parse_or(&lookup, "RETRIEVAL_TOP_K", defaults.top_k)?,
            cache_lookup,
        };

        if cfg.chunk_overlap >= cfg.chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({}) debe ser menor que CHUNK_SIZE ({})",
                cfg.chunk_overlap,
                cfg.chunk_size
            ));
        }
        if cfg.top_k == 0 {
            return Err(anyhow!("RETRIEVAL_TOP_K debe ser mayor que 0"));
        }

        Ok(cfg)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {key}: '{raw}'")),
        None => Ok(default),
    }
}
