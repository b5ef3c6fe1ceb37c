//! Índice vectorial plano en memoria (búsqueda por similitud coseno sobre todos
//! los vectores) y su formato serializado para la caché.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{errors::AppError, models::DocumentChunk};

/// Versión del formato en disco. Se incrementa ante cambios incompatibles.
pub const INDEX_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: DocumentChunk,
    pub vector: Vec<f64>,
}

/// Resultado de una búsqueda top-k.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub score: f64,
    pub chunk: DocumentChunk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    pub format_version: u32,
    pub embedding_model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Empareja cada chunk con su vector. Todos los vectores deben tener la misma dimensión.
    pub fn from_embeddings(
        embedding_model: impl Into<String>,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f64>>,
    ) -> Result<Self, AppError> {
        if chunks.len() != vectors.len() {
            return Err(AppError::Embedding(format!(
                "Número de embeddings ({}) distinto al número de chunks ({})",
                vectors.len(),
                chunks.len()
            )));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
            return Err(AppError::Embedding(format!(
                "Dimensión de embedding inconsistente: {} frente a {}",
                bad.len(),
                dimensions
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            format_version: INDEX_FORMAT_VERSION,
            embedding_model: embedding_model.into(),
            dimensions,
            built_at: Utc::now(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Devuelve los `k` chunks más similares a `query`, de mayor a menor puntuación.
    /// Los empates se resuelven por orden de inserción.
    pub fn search(&self, query: &[f64], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(query, &entry.vector)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                score,
                chunk: self.entries[i].chunk.clone(),
            })
            .collect()
    }
}

/// Similitud coseno; 0.0 para vectores vacíos, de distinta longitud o nulos.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use std::path::PathBuf;

    fn chunk(id: &str, text: &str, page: u32) -> DocumentChunk {
        DocumentChunk::new(
            id,
            text,
            ChunkMetadata {
                source: PathBuf::from("data/a.pdf"),
                page,
                start: 0,
                end: text.chars().count(),
            },
        )
        .unwrap()
    }

    fn sample() -> VectorIndex {
        VectorIndex::from_embeddings(
            "test-model",
            vec![chunk("a", "cielo", 0), chunk("b", "mar", 1), chunk("c", "tierra", 2)],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .unwrap()
    }

    #[test]
    fn search_orders_by_similarity() {
        let hits = sample().search(&[1.0, 0.1], 2);
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        assert_eq!(sample().search(&[0.0, 1.0], 10).len(), 3);
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let err = VectorIndex::from_embeddings("m", vec![chunk("a", "x", 0)], vec![]).unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let err = VectorIndex::from_embeddings(
            "m",
            vec![chunk("a", "x", 0), chunk("b", "y", 0)],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[test]
    fn cosine_edge_cases() {
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
