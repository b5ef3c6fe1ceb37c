//! Modelos de dominio: páginas extraídas, chunks, mensajes del chat y ficheros subidos.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Texto de una página tal y como sale del extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub source: PathBuf,
    /// Índice de página empezando en 0.
    pub page: u32,
    pub text: String,
}

/// Metadatos fijos de un chunk. Se validan al construir el chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: PathBuf,
    /// Índice de página empezando en 0 (se muestra como `page + 1`).
    pub page: u32,
    /// Rango `[start, end)` en caracteres dentro del texto de la página.
    pub start: usize,
    pub end: usize,
}

impl ChunkMetadata {
    /// Etiqueta legible para el usuario, con la página empezando en 1.
    pub fn page_label(&self) -> String {
        format!("Page {}", u64::from(self.page) + 1)
    }
}

/// Trozo de texto contiguo de una página.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidChunk(pub String);

impl fmt::Display for InvalidChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk inválido: {}", self.0)
    }
}

impl std::error::Error for InvalidChunk {}

impl DocumentChunk {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: ChunkMetadata,
    ) -> Result<Self, InvalidChunk> {
        let text = text.into();
        if text.is_empty() {
            return Err(InvalidChunk("texto vacío".into()));
        }
        if metadata.start >= metadata.end {
            return Err(InvalidChunk(format!(
                "rango vacío o invertido {}..{}",
                metadata.start, metadata.end
            )));
        }
        let chars = text.chars().count();
        if chars != metadata.end - metadata.start {
            return Err(InvalidChunk(format!(
                "el rango {}..{} no cubre los {} caracteres del texto",
                metadata.start, metadata.end, chars
            )));
        }
        Ok(Self {
            id: id.into(),
            text,
            metadata,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Entrada del historial de la conversación.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Fichero recibido desde la interfaz: nombre original + bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Nombre de fichero sin componentes de directorio, o `None` si no queda nada usable.
    pub fn file_name(&self) -> Option<&str> {
        Path::new(&self.name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(page: u32, start: usize, end: usize) -> ChunkMetadata {
        ChunkMetadata {
            source: PathBuf::from("data/a.pdf"),
            page,
            start,
            end,
        }
    }

    #[test]
    fn third_page_is_reported_as_page_three() {
        assert_eq!(meta(2, 0, 1).page_label(), "Page 3");
    }

    #[test]
    fn chunk_span_must_match_text_length() {
        assert!(DocumentChunk::new("c1", "héllo", meta(0, 10, 15)).is_ok());
        assert!(DocumentChunk::new("c1", "hello", meta(0, 10, 14)).is_err());
        assert!(DocumentChunk::new("c1", "", meta(0, 0, 0)).is_err());
    }

    #[test]
    fn upload_name_drops_directories() {
        let file = UploadedFile::new("../../etc/informe.pdf", b"%PDF".to_vec());
        assert_eq!(file.file_name(), Some("informe.pdf"));
        assert_eq!(UploadedFile::new("..", Vec::new()).file_name(), None);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hola")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hola"}"#);
    }
}
