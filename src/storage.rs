use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Writes `body` under `key` unless an object with that key already exists.
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<PutOutcome>;
    /// Returns `None` when the key is unknown or not a plain file name.
    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>>;
    /// Removes `key`; a missing object is not an error.
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
}

/// Uploads directory on local disk. Keys are flat file names.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self { root })
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        is_plain_file_name(key).then(|| self.root.join(key))
    }
}

/// Longest file name the common filesystems accept, in bytes.
const MAX_FILE_NAME_LEN: usize = 255;

/// True when `name` is exactly one normal path component the filesystem can hold.
pub fn is_plain_file_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_FILE_NAME_LEN || name.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes) -> anyhow::Result<PutOutcome> {
        let path = self
            .resolve(key)
            .with_context(|| format!("invalid object key {key:?}"))?;
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Ok(PutOutcome::AlreadyExists)
            }
            Err(e) => return Err(e).with_context(|| format!("create {}", path.display())),
        };
        file.write_all(&body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        file.flush().await.context("flush upload")?;
        Ok(PutOutcome::Created)
    }

    async fn get_object(&self, key: &str) -> anyhow::Result<Option<Bytes>> {
        let Some(path) = self.resolve(key) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidInput) => Ok(None),
            // a directory with that name is not a downloadable file
            Err(_) if path.is_dir() => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self
            .resolve(key)
            .with_context(|| format!("invalid object key {key:?}"))?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}
