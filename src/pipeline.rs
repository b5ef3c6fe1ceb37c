//! Pipeline de documentos: páginas → chunks → embeddings → índice vectorial.
//!
//! Todo o nada: si falla la extracción de cualquier fichero o el embedding,
//! no se devuelve índice alguno.

use std::{path::Path, sync::Arc};

use tracing::{error, info};
use uuid::Uuid;

use crate::{
    errors::AppError,
    llm::EmbeddingProvider,
    loader::PageLoader,
    models::{ChunkMetadata, DocumentChunk},
    splitter::TextSplitter,
    vector_index::VectorIndex,
};

#[derive(Clone)]
pub struct DocumentPipeline {
    loader: Arc<dyn PageLoader>,
    splitter: TextSplitter,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl DocumentPipeline {
    pub fn new(
        loader: Arc<dyn PageLoader>,
        splitter: TextSplitter,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            loader,
            splitter,
            embedder,
        }
    }

    /// Construye un índice a partir de `file_paths`, en el orden recibido.
    /// Si ninguna página tiene texto (p. ej. PDFs escaneados) no hay índice.
    pub async fn build<P: AsRef<Path>>(&self, file_paths: &[P]) -> Result<VectorIndex, AppError> {
        let mut all_chunks = Vec::new();

        for path in file_paths {
            let path = path.as_ref();
            let chunks = self.chunk_file(path).map_err(|err| {
                error!("Error procesando {}: {err}", path.display());
                err
            })?;
            info!("Procesado {}: {} chunks", path.display(), chunks.len());
            all_chunks.extend(chunks);
        }

        if all_chunks.is_empty() {
            let file = file_paths
                .first()
                .map(|p| p.as_ref().to_path_buf())
                .unwrap_or_default();
            error!("Ningún fichero contiene texto extraíble");
            return Err(AppError::processing(file, "no extractable text in the uploaded documents"));
        }

        let texts: Vec<String> = all_chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_texts(texts).await?;

        let index = VectorIndex::from_embeddings(self.embedder.model_id(), all_chunks, vectors)?;
        info!(
            "Índice construido: {} chunks de {} ficheros",
            index.len(),
            file_paths.len()
        );
        Ok(index)
    }

    fn chunk_file(&self, path: &Path) -> Result<Vec<DocumentChunk>, AppError> {
        let pages = self.loader.load_pages(path)?;

        let mut chunks = Vec::new();
        for page in pages {
            for (range, text) in self.splitter.split(&page.text) {
                let metadata = ChunkMetadata {
                    source: page.source.clone(),
                    page: page.page,
                    start: range.start,
                    end: range.end,
                };
                let chunk = DocumentChunk::new(Uuid::new_v4().to_string(), text, metadata)
                    .map_err(|e| AppError::processing(path, e))?;
                chunks.push(chunk);
            }
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageRecord;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cada "fichero" es una lista de páginas; `broken.pdf` falla siempre.
    struct FakeLoader;

    impl PageLoader for FakeLoader {
        fn load_pages(&self, path: &Path) -> Result<Vec<PageRecord>, AppError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name == "broken.pdf" {
                return Err(AppError::processing(path, "xref table not found"));
            }
            if name == "scanned.pdf" {
                return Ok(vec![PageRecord {
                    source: path.to_path_buf(),
                    page: 0,
                    text: " \n".to_string(),
                }]);
            }
            Ok(vec!["Intro page.", "", "The sky is blue."]
                .into_iter()
                .enumerate()
                .map(|(i, text)| PageRecord {
                    source: path.to_path_buf(),
                    page: i as u32,
                    text: if text.is_empty() {
                        String::new()
                    } else {
                        format!("{name}: {text}")
                    },
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_id(&self) -> &str {
            "fake-embedding"
        }

        async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Embedding("provider unavailable".into()));
            }
            Ok(texts.iter().map(|t| vec![t.len() as f64, 1.0]).collect())
        }
    }

    fn pipeline(embedder: Arc<CountingEmbedder>) -> DocumentPipeline {
        DocumentPipeline::new(Arc::new(FakeLoader), TextSplitter::default(), embedder)
    }

    #[tokio::test]
    async fn concatenates_chunks_across_files_with_one_embedding_call() {
        let embedder = Arc::new(CountingEmbedder::default());
        let index = pipeline(embedder.clone())
            .build(&[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")])
            .await
            .unwrap();

        // Dos páginas con texto por fichero; la página intermedia está vacía.
        assert_eq!(index.len(), 4);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(index.embedding_model, "fake-embedding");

        let pages: Vec<(String, u32)> = index
            .entries()
            .iter()
            .map(|e| (e.chunk.metadata.source.display().to_string(), e.chunk.metadata.page))
            .collect();
        assert_eq!(
            pages,
            vec![
                ("a.pdf".to_string(), 0),
                ("a.pdf".to_string(), 2),
                ("b.pdf".to_string(), 0),
                ("b.pdf".to_string(), 2),
            ]
        );
        assert_eq!(index.entries()[1].chunk.metadata.page_label(), "Page 3");
    }

    #[tokio::test]
    async fn one_broken_file_aborts_the_whole_build() {
        let embedder = Arc::new(CountingEmbedder::default());
        let err = pipeline(embedder.clone())
            .build(&["a.pdf", "broken.pdf", "c.pdf"])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Processing { ref file, .. } if file.ends_with("broken.pdf")));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn embedding_failure_aborts_the_build() {
        let embedder = Arc::new(CountingEmbedder {
            fail: true,
            ..Default::default()
        });
        let err = pipeline(embedder).build(&["a.pdf"]).await.unwrap_err();
        assert!(matches!(err, AppError::Embedding(_)));
    }

    #[tokio::test]
    async fn documents_without_text_are_a_processing_error() {
        let embedder = Arc::new(CountingEmbedder::default());
        let err = pipeline(embedder.clone())
            .build(&["scanned.pdf", "scanned.pdf"])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Processing { ref file, .. } if file.ends_with("scanned.pdf")));
        assert!(err.to_string().contains("no extractable text"));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
