//! Preguntas y respuestas sobre PDFs subidos por el usuario.
//!
//! Subida → huella de los ficheros → caché de índices en disco o pipeline
//! (páginas → chunks → embeddings → índice) → chat con recuperación top-k.

pub mod api;
pub mod app_state;
pub mod cache;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod llm;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod rag;
pub mod session;
pub mod splitter;
pub mod vector_index;
