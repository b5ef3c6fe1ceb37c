//! Extracción de texto página a página.

use std::path::Path;

use crate::{errors::AppError, models::PageRecord};

/// Fuente de páginas de un documento. El pipeline sólo depende de este contrato.
pub trait PageLoader: Send + Sync {
    fn load_pages(&self, path: &Path) -> Result<Vec<PageRecord>, AppError>;
}

/// Extractor de PDFs basado en `pdf-extract`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfPageLoader;

impl PageLoader for PdfPageLoader {
    fn load_pages(&self, path: &Path) -> Result<Vec<PageRecord>, AppError> {
        let pages = pdf_extract::extract_text_by_pages(path)
            .map_err(|e| AppError::processing(path, e.to_string()))?;

        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(idx, text)| PageRecord {
                source: path.to_path_buf(),
                page: idx as u32,
                text,
            })
            .collect())
    }
}
