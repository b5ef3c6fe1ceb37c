//! Consulta RAG sobre el índice cargado en la sesión.
//!
//! Flujo:
//!   1. Embedding de la pregunta.
//!   2. Búsqueda de los `top_k` chunks más cercanos.
//!   3. Prompt con los textos recuperados + la pregunta.
//!   4. Una única llamada al LLM, sin streaming.
//!   5. Se añaden a la respuesta las páginas de origen ("Page N").

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::info;

use crate::{
    errors::AppError,
    llm::{CompletionProvider, EmbeddingProvider},
    vector_index::{ScoredChunk, VectorIndex},
};

/// Respuesta del LLM junto a los chunks usados como contexto.
#[derive(Debug, Clone)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<String>,
    pub chunks: Vec<ScoredChunk>,
}

impl RagAnswer {
    /// Texto final mostrado al usuario, con la anotación de fuentes.
    pub fn render(&self) -> String {
        if self.sources.is_empty() {
            self.answer.clone()
        } else {
            format!("{}\n\n📚 Sources: {}", self.answer, self.sources.join(", "))
        }
    }
}

pub async fn rag_query(
    index: &VectorIndex,
    embedder: &dyn EmbeddingProvider,
    llm: &dyn CompletionProvider,
    question: &str,
    top_k: usize,
    temperature: f64,
) -> Result<RagAnswer, AppError> {
    // 1) Embedding de la pregunta
    let query_vec = embedder
        .embed_texts(vec![question.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Embedding("No se pudo generar embedding de la pregunta".into()))?;

    // 2) Top-k
    let chunks = index.search(&query_vec, top_k);
    info!("Recuperados {} chunks para la pregunta", chunks.len());

    // 3) y 4) Prompt + LLM
    let prompt = build_prompt(question, &chunks);
    let answer = llm.complete(&prompt, temperature).await?;

    Ok(RagAnswer {
        answer,
        sources: source_labels(&chunks),
        chunks,
    })
}

/// Prompt "stuff": todo el contexto recuperado seguido de la pregunta.
pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
{context}\n\nQuestion: {question}\nHelpful Answer:"
    )
}

/// Etiquetas "Page N" únicas (N empieza en 1), ordenadas por fichero y página.
pub fn source_labels(chunks: &[ScoredChunk]) -> Vec<String> {
    let pages: BTreeSet<(PathBuf, u32)> = chunks
        .iter()
        .map(|c| (c.chunk.metadata.source.clone(), c.chunk.metadata.page))
        .collect();

    let mut labels: Vec<String> = Vec::new();
    for (_, page) in pages {
        let label = format!("Page {}", u64::from(page) + 1);
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}
