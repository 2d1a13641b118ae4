//! File-backed state store.
//!
//! The file holds nothing but the dotted-decimal address, e.g. `203.0.113.9`.
//! Each write replaces the whole file through a temporary sibling and a rename.

use super::StateStore;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores the last IP as plain text at a fixed path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store at `path`. Nothing is touched until the first access.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_and_replace(&self, temp_path: &Path, ip: Ipv4Addr) -> Result<()> {
        {
            let mut file = fs::File::create(temp_path)
                .await
                .map_err(|e| self.write_error("Failed to create temp file for", e))?;

            file.write_all(ip.to_string().as_bytes())
                .await
                .map_err(|e| self.write_error("Failed to write", e))?;

            file.flush()
                .await
                .map_err(|e| self.write_error("Failed to flush", e))?;
        }

        fs::rename(temp_path, &self.path)
            .await
            .map_err(|e| self.write_error("Failed to replace", e))
    }

    fn write_error(&self, action: &str, e: std::io::Error) -> DdnsError {
        DdnsError::StoreWrite(format!("{} {}: {}", action, self.path.display(), e))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self) -> Result<Option<Ipv4Addr>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No stored IP at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(DdnsError::StoreRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let raw = content.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        raw.parse().map(Some).map_err(|_| {
            DdnsError::StoreRead(format!(
                "{} does not contain an IPv4 address",
                self.path.display()
            ))
        })
    }

    async fn put(&self, ip: Ipv4Addr) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error("Failed to create directory for", e))?;
            }
        }

        let temp_path = self.temp_path();
        if let Err(e) = self.write_and_replace(&temp_path, ip).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        "Failed to remove {}: {}",
                        temp_path.display(),
                        cleanup
                    );
                }
            }
            return Err(e);
        }

        tracing::trace!("Stored IP {} in {}", ip, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_absent() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("last-ip"));

        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_plain_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("last-ip");
        let store = FileStore::new(&path);

        let ip = Ipv4Addr::new(203, 0, 113, 9);
        store.put(ip).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "203.0.113.9");
        assert!(!store.temp_path().exists());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get().await.unwrap(), Some(ip));
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("last-ip"));

        store.put(Ipv4Addr::new(203, 0, 113, 5)).await.unwrap();
        store.put(Ipv4Addr::new(203, 0, 113, 9)).await.unwrap();

        assert_eq!(
            store.get().await.unwrap(),
            Some(Ipv4Addr::new(203, 0, 113, 9))
        );
    }

    #[tokio::test]
    async fn test_file_store_tolerates_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip");
        std::fs::write(&path, "198.51.100.2\n").unwrap();

        let store = FileStore::new(&path);
        assert_eq!(
            store.get().await.unwrap(),
            Some(Ipv4Addr::new(198, 51, 100, 2))
        );
    }

    #[tokio::test]
    async fn test_file_store_empty_file_is_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip");
        std::fs::write(&path, "").unwrap();

        assert_eq!(FileStore::new(&path).get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_garbage_is_read_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip");
        std::fs::write(&path, [0xcb, 0x00, 0x71, 0x05]).unwrap();

        assert!(matches!(
            FileStore::new(&path).get().await,
            Err(DdnsError::StoreRead(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_directory_is_read_error() {
        let dir = tempdir().unwrap();

        assert!(matches!(
            FileStore::new(dir.path()).get().await,
            Err(DdnsError::StoreRead(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_failed_replace_removes_temp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last-ip");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let store = FileStore::new(&path);
        let result = store.put(Ipv4Addr::new(203, 0, 113, 9)).await;

        assert!(matches!(result, Err(DdnsError::StoreWrite(_))));
        assert!(!store.temp_path().exists());
        assert!(path.join("keep").exists());
    }
}
