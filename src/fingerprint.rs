//! Huella de un conjunto de ficheros: contenido + fecha de modificación.
//!
//! El orden de entrada no importa: las rutas se ordenan antes de combinarse.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::errors::AppError;

/// Calcula la huella combinada de `paths`.
pub fn fingerprint<P: AsRef<Path>>(paths: &[P]) -> Result<String, AppError> {
    let mut sorted: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    sorted.sort();

    let mut combined = String::new();
    for path in &sorted {
        combined.push_str(&file_component(path)?);
    }

    Ok(hex::encode(Sha256::digest(combined.as_bytes())))
}

/// `<mtime RFC 3339 con nanosegundos><sha256 del contenido>` de un fichero.
fn file_component(path: &Path) -> Result<String, AppError> {
    let bytes = fs::read(path).map_err(|e| AppError::io(path, e))?;
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| AppError::io(path, e))?;
    let modified: DateTime<Utc> = DateTime::<Utc>::from(modified);

    Ok(format!(
        "{}{}",
        modified.to_rfc3339_opts(SecondsFormat::Nanos, true),
        hex::encode(Sha256::digest(&bytes))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, when: SystemTime) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    #[test]
    fn same_files_give_same_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.pdf", b"alpha");
        let b = write(&dir, "b.pdf", b"beta");

        let first = fingerprint(&[&a, &b]).unwrap();
        let second = fingerprint(&[&a, &b]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn input_order_does_not_matter() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.pdf", b"alpha");
        let b = write(&dir, "b.pdf", b"beta");
        let c = write(&dir, "c.pdf", b"gamma");

        assert_eq!(
            fingerprint(&[&a, &b, &c]).unwrap(),
            fingerprint(&[&c, &a, &b]).unwrap()
        );
    }

    #[test]
    fn one_byte_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.pdf", b"alpha");
        let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        set_mtime(&a, when);
        let before = fingerprint(&[&a]).unwrap();

        fs::write(&a, b"alphb").unwrap();
        set_mtime(&a, when);
        assert_ne!(before, fingerprint(&[&a]).unwrap());
    }

    #[test]
    fn mtime_change_changes_fingerprint() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.pdf", b"alpha");
        set_mtime(&a, SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        let before = fingerprint(&[&a]).unwrap();

        set_mtime(&a, SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_060));
        assert_ne!(before, fingerprint(&[&a]).unwrap());
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.pdf");
        let err = fingerprint(&[missing]).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
