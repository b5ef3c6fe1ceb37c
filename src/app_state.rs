use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::session::{SessionController, SessionState};

/// Sesión compartida entre peticiones. El mutex asíncrono serializa las
/// acciones de una misma sesión (subida y chat nunca se solapan).
pub type SharedSession = Arc<tokio::sync::Mutex<SessionState>>;

#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
    pub sessions: Arc<Mutex<HashMap<Uuid, SharedSession>>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_shutdown(mut self, sender: oneshot::Sender<()>) -> Self {
        self.shutdown_sender = Arc::new(Mutex::new(Some(sender)));
        self
    }

    pub fn create_session(&self) -> Uuid {
        let state = SessionState::new();
        let id = state.id;
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(tokio::sync::Mutex::new(state)));
        id
    }

    pub fn session(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove_session(&self, id: &Uuid) -> bool {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn take_shutdown_sender(&self) -> Option<oneshot::Sender<()>> {
        self.shutdown_sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
