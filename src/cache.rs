//! Caché en disco de índices vectoriales, indexada por huella.
//!
//! No hay expiración ni límite de tamaño: el directorio se limpia a mano.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    errors::AppError,
    vector_index::{VectorIndex, INDEX_FORMAT_VERSION},
};

pub const CACHE_EXTENSION: &str = "index.json";

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ruta de la entrada para `fingerprint`. Crea el directorio si aún no existe.
    pub fn path_for(&self, fingerprint: &str) -> Result<PathBuf, AppError> {
        fs::create_dir_all(&self.dir).map_err(|e| AppError::io(&self.dir, e))?;
        Ok(self.dir.join(format!("{fingerprint}.{CACHE_EXTENSION}")))
    }

    pub fn exists(&self, location: &Path) -> bool {
        location.is_file()
    }

    /// Carga un índice. Falla si el JSON no se entiende, si la versión del formato
    /// es otra o si fue generado con un modelo de embeddings distinto.
    pub fn load(&self, location: &Path, embedding_model: &str) -> Result<VectorIndex, AppError> {
        let raw = fs::read(location).map_err(|e| AppError::io(location, e))?;
        let index: VectorIndex =
            serde_json::from_slice(&raw).map_err(|e| AppError::Deserialization {
                path: location.to_path_buf(),
                reason: e.to_string(),
            })?;

        if index.format_version != INDEX_FORMAT_VERSION {
            return Err(AppError::Deserialization {
                path: location.to_path_buf(),
                reason: format!(
                    "versión de formato {} no soportada (se esperaba {})",
                    index.format_version, INDEX_FORMAT_VERSION
                ),
            });
        }
        if index.embedding_model != embedding_model {
            return Err(AppError::Deserialization {
                path: location.to_path_buf(),
                reason: format!(
                    "índice generado con el modelo '{}', configurado '{}'",
                    index.embedding_model, embedding_model
                ),
            });
        }

        info!(
            "Índice cargado desde caché: {} ({} chunks)",
            location.display(),
            index.len()
        );
        Ok(index)
    }

    /// Guarda el índice, sustituyendo cualquier entrada previa en `location`.
    pub fn save(&self, index: &VectorIndex, location: &Path) -> Result<(), AppError> {
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
        }

        let payload = serde_json::to_vec(index).map_err(|e| {
            AppError::io(location, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;

        // Cada escritor usa su propio fichero temporal: varias sesiones pueden
        // guardar la misma huella a la vez y gana el último `rename`.
        let tmp = temp_path_for(location);
        fs::write(&tmp, payload).map_err(|e| AppError::io(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, location) {
            if let Err(cleanup) = fs::remove_file(&tmp) {
                warn!("No se pudo borrar {}: {cleanup}", tmp.display());
            }
            return Err(AppError::io(location, e));
        }

        info!("Índice guardado en caché: {}", location.display());
        Ok(())
    }
}

/// `<entrada>.<uuid>.tmp` en el mismo directorio que la entrada.
fn temp_path_for(location: &Path) -> PathBuf {
    let name = location
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    location.with_file_name(format!("{name}.{}.tmp", Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DocumentChunk};
    use tempfile::TempDir;

    fn index(model: &str) -> VectorIndex {
        let chunk = DocumentChunk::new(
            "c0",
            "The sky is blue.",
            ChunkMetadata {
                source: PathBuf::from("data/sky.pdf"),
                page: 0,
                start: 0,
                end: 16,
            },
        )
        .unwrap();
        VectorIndex::from_embeddings(model, vec![chunk], vec![vec![0.25, 0.5, 1.0]]).unwrap()
    }

    #[test]
    fn path_for_creates_the_directory() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path().join("cache"));
        let path = store.path_for("abc123").unwrap();

        assert!(store.dir().is_dir());
        assert_eq!(path, tmp.path().join("cache").join("abc123.index.json"));
        assert!(!store.exists(&path));
    }

    #[test]
    fn save_then_load_returns_the_same_index() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let path = store.path_for("fp").unwrap();
        let original = index("embedding-001");

        store.save(&original, &path).unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.load(&path, "embedding-001").unwrap(), original);
    }

    #[test]
    fn save_overwrites_previous_entry() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let path = store.path_for("fp").unwrap();

        store.save(&index("embedding-001"), &path).unwrap();
        let replacement = index("embedding-001");
        store.save(&replacement, &path).unwrap();
        assert_eq!(store.load(&path, "embedding-001").unwrap(), replacement);
    }

    #[test]
    fn concurrent_saves_of_one_fingerprint_all_succeed() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let path = store.path_for("fp").unwrap();
        let shared = index("embedding-001");

        let failures: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        (0..30)
                            .filter(|_| store.save(&shared, &path).is_err())
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(failures, 0);
        assert_eq!(store.load(&path, "embedding-001").unwrap(), shared);
        let leftovers = fs::read_dir(tmp.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().is_some_and(|x| x == "tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_entry_is_a_deserialization_error() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let path = store.path_for("fp").unwrap();
        fs::write(&path, b"{ not json").unwrap();

        let err = store.load(&path, "embedding-001").unwrap_err();
        assert!(matches!(err, AppError::Deserialization { .. }));
    }

    #[test]
    fn other_model_or_version_is_incompatible() {
        let tmp = TempDir::new().unwrap();
        let store = CacheStore::new(tmp.path());
        let path = store.path_for("fp").unwrap();
        store.save(&index("embedding-001"), &path).unwrap();

        let err = store.load(&path, "text-embedding-3-small").unwrap_err();
        assert!(matches!(err, AppError::Deserialization { .. }));

        let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        value["format_version"] = serde_json::json!(INDEX_FORMAT_VERSION + 1);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();
        let err = store.load(&path, "embedding-001").unwrap_err();
        assert!(matches!(err, AppError::Deserialization { .. }));
    }
}
