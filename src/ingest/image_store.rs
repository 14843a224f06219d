//! On-disk storage for captured image bytes
//!
//! The payload is opaque: it is written as-is under a unique name and the
//! absolute path becomes the capture's identity in the database.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::database::{StoreError, StoreResult};

/// An image file written by [`ImageStore::write`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredImage {
    /// Absolute path, as recorded in `image_capture.file_path`
    pub file_path: String,
    pub size_bytes: usize,
}

impl StoredImage {
    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }
}

/// Directory holding captured images
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Use `dir` for image files, creating it when missing
    pub fn new(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = absolute_path(dir.as_ref())?;
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoreError::storage_unavailable(format!(
                "Failed to create image directory '{}': {}",
                dir.display(),
                e
            ))
        })?;
        // canonical now that it exists
        let dir = absolute_path(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write one image payload under a fresh name
    pub fn write(&self, bytes: &[u8]) -> StoreResult<StoredImage> {
        if bytes.is_empty() {
            return Err(StoreError::invalid_argument("Image payload is empty"));
        }

        let path = self.dir.join(unique_file_name());
        write_new(&path, bytes).map_err(|e| {
            StoreError::storage_unavailable(format!(
                "Failed to write image '{}': {}",
                path.display(),
                e
            ))
        })?;

        let file_path = path
            .to_str()
            .ok_or_else(|| {
                StoreError::storage_unavailable(format!(
                    "Image path '{}' is not valid UTF-8",
                    path.display()
                ))
            })?
            .to_string();

        debug!("Wrote {} bytes to {}", bytes.len(), file_path);
        Ok(StoredImage {
            file_path,
            size_bytes: bytes.len(),
        })
    }

    /// Remove a file written by this store; failures are only logged
    pub fn discard(&self, image: &StoredImage) {
        if let Err(e) = std::fs::remove_file(image.path()) {
            warn!("Failed to remove image {}: {}", image.file_path, e);
        }
    }
}

/// Create `path` and write `bytes`; an existing file is never replaced
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = file.write_all(bytes).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

/// `capture_<UTC yyyymmdd_HHMMSS>_<8 hex chars>.jpg`
fn unique_file_name() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("capture_{}_{}.jpg", stamp, &suffix[..8])
}

/// Absolute form of `path`, following symlinks when the file exists
///
/// Used both when writing and when resolving a capture by path, so the two
/// sides agree on the stored string.
pub fn absolute_path(path: &Path) -> StoreResult<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(StoreError::invalid_argument("Path must not be empty"));
    }
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| {
            StoreError::storage_unavailable(format!("Failed to resolve current directory: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StoreErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_write_new_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("capture_20240501_120000_1a2b3c4d.jpg");
        std::fs::write(&path, b"first frame").unwrap();

        let err = write_new(&path, b"second frame").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"first frame");

        let fresh = dir.path().join("capture_20240501_120000_5e6f7a8b.jpg");
        write_new(&fresh, b"second frame").unwrap();
        assert_eq!(std::fs::read(&fresh).unwrap(), b"second frame");
    }

    #[test]
    fn test_write_creates_unique_absolute_files() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path().join("images")).unwrap();

        let a = store.write(b"\xff\xd8jpeg-a").unwrap();
        let b = store.write(b"\xff\xd8jpeg-b").unwrap();

        assert_ne!(a.file_path, b.file_path);
        assert!(a.path().is_absolute());
        assert!(a.path().starts_with(store.dir()));
        assert_eq!(std::fs::read(a.path()).unwrap(), b"\xff\xd8jpeg-a");

        let name = a.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("capture_"));
        assert!(name.ends_with(".jpg"));
        // capture_ + yyyymmdd_HHMMSS + _ + 8 hex + .jpg
        assert_eq!(name.len(), 8 + 15 + 1 + 8 + 4);
    }

    #[test]
    fn test_empty_payload_rejected() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let err = store.write(b"").unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidArgument);
    }

    #[test]
    fn test_discard_removes_file() {
        let dir = TempDir::new().unwrap();
        let store = ImageStore::new(dir.path()).unwrap();
        let image = store.write(b"bytes").unwrap();
        store.discard(&image);
        assert!(!image.path().exists());
        // second discard only logs
        store.discard(&image);
    }

    #[test]
    fn test_absolute_path() {
        assert!(absolute_path(Path::new("")).is_err());
        let rel = absolute_path(Path::new("not/here.jpg")).unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("not/here.jpg"));
    }
}
