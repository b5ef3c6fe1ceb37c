//! Tipos de error de la aplicación, discriminados por origen.

use std::path::PathBuf;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error en {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error processing {file}: {source}")]
    Processing {
        file: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Entrada de caché ilegible en {path}: {reason}")]
    Deserialization { path: PathBuf, reason: String },

    #[error("No hay ningún índice cargado: sube primero algún PDF")]
    NoIndex,

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn processing(file: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Self::Processing {
            file: file.into(),
            source: source.into(),
        }
    }

    /// Mensaje completo con la cadena de causas, para mostrar al usuario.
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        let mut current = std::error::Error::source(self);
        if current.is_some() {
            out.push_str("\n\nCaused by:");
        }
        let mut depth = 0;
        while let Some(cause) = current {
            out.push_str(&format!("\n    {depth}: {cause}"));
            depth += 1;
            current = cause.source();
        }
        out
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NoIndex | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Embedding(_) | AppError::Llm(_) => StatusCode::BAD_GATEWAY,
            AppError::Io { .. }
            | AppError::Processing { .. }
            | AppError::Deserialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({
                "error": self.to_string(),
                "status": "error"
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_error_names_the_file_and_keeps_the_cause() {
        let err = AppError::processing(
            "data/b.pdf",
            std::io::Error::new(std::io::ErrorKind::InvalidData, "xref roto"),
        );
        assert!(err.to_string().contains("data/b.pdf"));
        let trace = err.trace();
        assert!(trace.contains("Caused by:"));
        assert!(trace.contains("xref roto"));
    }

    #[test]
    fn trace_without_cause_is_just_the_message() {
        let err = AppError::Embedding("quota".into());
        assert_eq!(err.trace(), "Embedding error: quota");
    }

    #[test]
    fn invalid_input_and_missing_index_are_client_errors() {
        let resp = AppError::InvalidInput("la pregunta está vacía".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NoIndex.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::Llm("503".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
