//! Controlador de sesión: subida → huella → caché / pipeline → chat.
//!
//! Todo el estado mutable de una sesión vive en [`SessionState`] y se pasa de
//! forma explícita a cada operación del [`SessionController`].

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    cache::CacheStore,
    config::{AppConfig, CacheLookup},
    errors::AppError,
    fingerprint::fingerprint,
    llm::{CompletionProvider, EmbeddingProvider},
    models::{ChatMessage, UploadedFile},
    pipeline::DocumentPipeline,
    rag,
    vector_index::VectorIndex,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Empty,
    Building,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Mensaje para el usuario tras una subida.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    /// Cadena completa de causas en los errores de construcción.
    pub trace: Option<String>,
}

/// Cómo se obtuvo el índice de la última subida.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    CacheHit,
    Built,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub source: IndexSource,
    pub fingerprint: String,
    pub documents: usize,
    pub chunks: usize,
}

/// Estado de una sesión de usuario.
#[derive(Debug)]
pub struct SessionState {
    pub id: Uuid,
    pub phase: SessionPhase,
    pub index: Option<VectorIndex>,
    pub fingerprint: Option<String>,
    pub transcript: Vec<ChatMessage>,
    pub last_notice: Option<Notice>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: SessionPhase::Empty,
            index: None,
            fingerprint: None,
            transcript: Vec::new(),
            last_notice: None,
        }
    }

    pub fn can_answer(&self) -> bool {
        self.phase == SessionPhase::Ready && self.index.is_some()
    }

    fn settle_phase(&mut self) {
        self.phase = if self.index.is_some() {
            SessionPhase::Ready
        } else {
            SessionPhase::Empty
        };
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Colaboradores compartidos por todas las sesiones.
#[derive(Clone)]
pub struct SessionController {
    data_dir: PathBuf,
    cache: CacheStore,
    pipeline: DocumentPipeline,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn CompletionProvider>,
    top_k: usize,
    temperature: f64,
    cache_lookup: CacheLookup,
}

impl SessionController {
    pub fn new(
        cfg: &AppConfig,
        pipeline: DocumentPipeline,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self {
            data_dir: cfg.data_dir.clone(),
            cache: CacheStore::new(&cfg.cache_dir),
            pipeline,
            embedder,
            llm,
            top_k: cfg.top_k,
            temperature: cfg.llm_temperature,
            cache_lookup: cfg.cache_lookup,
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    // ---------------------------------------------------------------------
    // SUBIDA
    // ---------------------------------------------------------------------

    /// Frontera de la subida: nunca falla, deja el resultado en `state.last_notice`.
    pub async fn handle_upload(&self, state: &mut SessionState, files: Vec<UploadedFile>) -> Notice {
        let notice = match self.upload(state, files).await {
            Ok(outcome) => {
                info!(
                    "Sesión {}: {} documentos listos ({:?}, {} chunks)",
                    state.id, outcome.documents, outcome.source, outcome.chunks
                );
                Notice {
                    kind: NoticeKind::Success,
                    message: format!("Processed {} documents!", outcome.documents),
                    trace: None,
                }
            }
            Err(err) => {
                error!("Sesión {}: error en la subida: {err}", state.id);
                Notice {
                    kind: NoticeKind::Error,
                    message: format!("Error: {err}"),
                    trace: Some(err.trace()),
                }
            }
        };
        state.last_notice = Some(notice.clone());
        notice
    }

    /// Guarda los ficheros y carga (o construye) el índice correspondiente.
    pub async fn upload(
        &self,
        state: &mut SessionState,
        files: Vec<UploadedFile>,
    ) -> Result<UploadOutcome, AppError> {
        if files.is_empty() {
            return Err(AppError::InvalidInput("no se ha recibido ningún fichero".into()));
        }
        let paths = self.persist_uploads(&files)?;
        self.load_or_build(state, &paths).await
    }

    /// Escribe cada fichero en el directorio de datos con su nombre original.
    /// Para un mismo nombre gana la última escritura; si el contenido no cambia
    /// el fichero no se toca y conserva su fecha de modificación.
    pub fn persist_uploads(&self, files: &[UploadedFile]) -> Result<Vec<PathBuf>, AppError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| AppError::io(&self.data_dir, e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for file in files {
            let name = file.file_name().ok_or_else(|| {
                AppError::InvalidInput(format!("nombre de fichero inválido: '{}'", file.name))
            })?;
            let path = self.data_dir.join(name);

            let unchanged = fs::read(&path).map(|old| old == file.bytes).unwrap_or(false);
            if !unchanged {
                fs::write(&path, &file.bytes).map_err(|e| AppError::io(&path, e))?;
            }

            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Decide acierto/fallo de caché y deja el índice resultante en la sesión.
    pub async fn load_or_build(
        &self,
        state: &mut SessionState,
        paths: &[PathBuf],
    ) -> Result<UploadOutcome, AppError> {
        let current = fingerprint(paths)?;
        let location = self.cache.path_for(&current)?;

        if self.is_cache_hit(state, &current, &location) {
            match self.cache.load(&location, self.embedder.model_id()) {
                Ok(index) => {
                    info!("Caché: acierto para {current}");
                    return Ok(self.install(state, index, current, paths.len(), IndexSource::CacheHit));
                }
                Err(err @ AppError::Deserialization { .. }) => {
                    warn!("Caché inutilizable, se reconstruye: {err}");
                }
                Err(err) => return Err(err),
            }
        } else {
            info!("Caché: fallo para {current}");
        }

        state.phase = SessionPhase::Building;
        match self.build_and_save(paths, &location).await {
            Ok(index) => Ok(self.install(state, index, current, paths.len(), IndexSource::Built)),
            Err(err) => {
                // Si el índice en memoria correspondía a estos mismos ficheros ya no es fiable.
                if state.fingerprint.as_deref() == Some(current.as_str()) {
                    state.index = None;
                    state.fingerprint = None;
                }
                state.settle_phase();
                Err(err)
            }
        }
    }

    fn is_cache_hit(&self, state: &SessionState, current: &str, location: &Path) -> bool {
        if !self.cache.exists(location) {
            return false;
        }
        match self.cache_lookup {
            CacheLookup::Session => state.fingerprint.as_deref() == Some(current),
            CacheLookup::Disk => true,
        }
    }

    async fn build_and_save(&self, paths: &[PathBuf], location: &Path) -> Result<VectorIndex, AppError> {
        let index = self.pipeline.build(paths).await?;
        self.cache.save(&index, location)?;
        Ok(index)
    }

    fn install(
        &self,
        state: &mut SessionState,
        index: VectorIndex,
        fingerprint: String,
        documents: usize,
        source: IndexSource,
    ) -> UploadOutcome {
        let chunks = index.len();
        state.index = Some(index);
        state.fingerprint = Some(fingerprint.clone());
        state.phase = SessionPhase::Ready;
        UploadOutcome {
            source,
            fingerprint,
            documents,
            chunks,
        }
    }

    // ---------------------------------------------------------------------
    // CHAT
    // ---------------------------------------------------------------------

    /// Un turno de chat. Sin índice se devuelve `NoIndex` y no hay respuesta del
    /// asistente; un fallo del proveedor sí queda en el historial como respuesta.
    pub async fn chat_turn(
        &self,
        state: &mut SessionState,
        question: &str,
    ) -> Result<ChatMessage, AppError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::InvalidInput("la pregunta está vacía".into()));
        }
        state.transcript.push(ChatMessage::user(question));

        let index = match (&state.index, state.can_answer()) {
            (Some(index), true) => index,
            _ => return Err(AppError::NoIndex),
        };

        let result = rag::rag_query(
            index,
            self.embedder.as_ref(),
            self.llm.as_ref(),
            question,
            self.top_k,
            self.temperature,
        )
        .await;

        match result {
            Ok(answer) => {
                let reply = ChatMessage::assistant(answer.render());
                state.transcript.push(reply.clone());
                Ok(reply)
            }
            Err(err) => {
                error!("Sesión {}: error generando respuesta: {err}", state.id);
                state
                    .transcript
                    .push(ChatMessage::assistant(format!("Error generating response: {err}")));
                Err(err)
            }
        }
    }

    /// Borra el historial; el índice cargado se mantiene.
    pub fn clear_history(&self, state: &mut SessionState) {
        state.transcript.clear();
    }
}
