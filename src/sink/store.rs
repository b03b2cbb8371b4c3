//! Durable object storage for finished datasets.

use crate::sink::error::StoreError;
use crate::sink::signing::{SignedUrl, UrlSigner};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tokio::{fs, task};

/// Key-addressed durable storage that can hand out short-lived links.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `key`; the object is durable once this returns `Ok`.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StoreError>;
}

/// Rejects keys that could escape the store root.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Stores objects as files below a root directory.
pub struct LocalObjectStore {
    root: PathBuf,
    signer: UrlSigner,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: &Path, signer: UrlSigner, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            signer,
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    /// Writes through a temp file in the target directory, syncs it, then
    /// renames it into place so readers never see a partial object.
    fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
        std::fs::create_dir_all(parent)
            .map_err(|e| StoreError::DirCreation(parent.to_path_buf(), e))?;
        let mut temp_file =
            NamedTempFile::new_in(parent).map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .write_all(bytes)
            .map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| StoreError::Write(path.to_path_buf(), e))?;
        temp_file
            .persist(path)
            .map_err(|e| StoreError::Write(path.to_path_buf(), e.error))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let size = bytes.len();
        let path_clone = path.clone();
        task::spawn_blocking(move || Self::write_atomically(&path_clone, &bytes)).await??;
        info!("Stored {} bytes at {:?}", size, path);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_string()),
            _ => StoreError::Read(path.clone(), e),
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Read(path.clone(), e))
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StoreError> {
        validate_key(key)?;
        self.signer.sign(&self.public_base_url, key, ttl, Utc::now())
    }
}

/// Keeps objects in process memory.
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    signer: UrlSigner,
    public_base_url: String,
}

impl MemoryObjectStore {
    pub fn new(signer: UrlSigner, public_base_url: impl Into<String>) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            signer,
            public_base_url: public_base_url.into(),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_key(key)?;
        debug!("Storing {} bytes in memory at {}", bytes.len(), key);
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.lock().await.contains_key(key))
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<SignedUrl, StoreError> {
        validate_key(key)?;
        self.signer.sign(&self.public_base_url, key, ttl, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("tmp/1_daily_2010-01_2010-12.csv").is_ok());
        for bad in ["", "/etc/passwd", "tmp/../x", "tmp//x", "./x", "tmp\\x"] {
            assert!(
                matches!(validate_key(bad), Err(StoreError::InvalidKey(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_local_store_put_get_exists() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalObjectStore::new(dir.path(), UrlSigner::new("s"), "/files");

        assert!(!store.exists("tmp/a.csv").await?);
        store.put("tmp/a.csv", b"Date/Time\n2019-01\n".to_vec()).await?;
        assert!(store.exists("tmp/a.csv").await?);
        assert_eq!(store.get("tmp/a.csv").await?, b"Date/Time\n2019-01\n".to_vec());
        assert_eq!(store.root(), dir.path());
        assert!(store.root().join("tmp").join("a.csv").is_file());

        // Overwrites replace the whole object.
        store.put("tmp/a.csv", b"x".to_vec()).await?;
        assert_eq!(store.get("tmp/a.csv").await?, b"x".to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn test_local_store_missing_and_invalid_keys() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = LocalObjectStore::new(dir.path(), UrlSigner::new("s"), "/files");

        assert!(matches!(store.get("tmp/none.csv").await, Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.put("../escape.csv", vec![1]).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(store.signed_url("tmp/a.csv", Duration::from_secs(100))?.url.starts_with("/files/tmp/a.csv?"));
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store() -> Result<(), StoreError> {
        let store = MemoryObjectStore::new(UrlSigner::new("s"), "https://files.example");
        store.put("tmp/b.csv", vec![1, 2]).await?;
        store.put("tmp/a.csv", vec![3]).await?;
        assert_eq!(store.keys().await, vec!["tmp/a.csv", "tmp/b.csv"]);
        assert_eq!(store.get("tmp/b.csv").await?, vec![1, 2]);
        assert!(!store.exists("tmp/c.csv").await?);
        Ok(())
    }
}
