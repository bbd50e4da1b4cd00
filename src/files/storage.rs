use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum FileStorageError {
    #[error("file not found")]
    NotFound,
    #[error("invalid storage pointer")]
    InvalidPointer,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileStorageError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Filesystem blob store. Uploaded bytes live under
/// `<data>/uploads/<owner>/<uuid>.<ext>`; the relative path is the opaque
/// location pointer persisted by the document registry.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_path: data_dir.join("uploads"),
        }
    }

    fn resolve(&self, pointer: &str) -> Result<PathBuf, FileStorageError> {
        validate_pointer(pointer)?;
        Ok(self.base_path.join(pointer))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path.join("tmp").join(Uuid::new_v4().to_string())
    }

    /// Stores a blob for `owner_id` and returns its location pointer.
    /// The extension of `original_name` is preserved, nothing else is.
    pub async fn put(
        &self,
        data: &[u8],
        owner_id: &str,
        original_name: &str,
    ) -> Result<String, FileStorageError> {
        let name = match Path::new(original_name).extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{ext}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let pointer = format!("{owner_id}/{name}");
        let final_path = self.resolve(&pointer)?;

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(data).await?;
        temp_file.sync_all().await?;

        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&temp_path, &final_path).await?;

        Ok(pointer)
    }

    pub async fn get(&self, pointer: &str) -> Result<Vec<u8>, FileStorageError> {
        let path = self.resolve(pointer)?;
        fs::read(&path).await.map_err(FileStorageError::from_io)
    }

    /// Opens a blob for streaming reads.
    pub async fn open(&self, pointer: &str) -> Result<File, FileStorageError> {
        let path = self.resolve(pointer)?;
        File::open(&path).await.map_err(FileStorageError::from_io)
    }

    /// Removes a blob. Returns false if it was already gone.
    pub async fn delete(&self, pointer: &str) -> Result<bool, FileStorageError> {
        let path = self.resolve(pointer)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileStorageError::Io(e)),
        }
    }
}

/// Pointers are relative paths minted by `put`; anything absolute or
/// containing parent components is rejected before touching the filesystem.
fn validate_pointer(pointer: &str) -> Result<(), FileStorageError> {
    if pointer.is_empty() {
        return Err(FileStorageError::InvalidPointer);
    }

    let path = Path::new(pointer);
    if !path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return Err(FileStorageError::InvalidPointer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let pointer = storage.put(b"hello world", "user-1", "notes.txt").await.unwrap();
        assert!(pointer.starts_with("user-1/"));
        assert!(pointer.ends_with(".txt"));

        let content = storage.get(&pointer).await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn test_pointer_without_extension() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let pointer = storage.put(b"data", "user-1", "Makefile").await.unwrap();
        assert!(!pointer.contains('.'));
        assert_eq!(storage.get(&pointer).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(matches!(
            storage.get("user-1/missing.txt").await,
            Err(FileStorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let pointer = storage.put(b"bytes", "user-1", "a.bin").await.unwrap();
        assert!(storage.delete(&pointer).await.unwrap());
        assert!(!storage.delete(&pointer).await.unwrap());
        assert!(matches!(
            storage.get(&pointer).await,
            Err(FileStorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        for pointer in ["../escape", "/etc/passwd", "a/../../b", ""] {
            assert!(matches!(
                storage.get(pointer).await,
                Err(FileStorageError::InvalidPointer)
            ));
        }
    }
}
