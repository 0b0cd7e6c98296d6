use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{AppConfig, StorageBackend};
use crate::s3::S3Storage;

/// Column width of `documents.original_filename`.
pub const MAX_ORIGINAL_FILENAME_CHARS: usize = 255;

/// Budget for the sanitized part of a storage name. With the uuid prefix the
/// key stays below the usual 255-byte file name limit.
const MAX_STORED_NAME_CHARS: usize = 200;

/// Extensions longer than this are treated as part of the stem.
const MAX_EXTENSION_CHARS: usize = 16;

/// Binary file persistence. Keys are flat storage names produced by
/// [`storage_name_for`].
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()>;

    /// `Ok(None)` when no object is stored under `key`.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Deleting a missing object is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;

    async fn list_keys(&self) -> Result<Vec<String>>;
}

/// Storage selected by `STORAGE_BACKEND`.
pub async fn storage_from_config(config: &AppConfig) -> Result<Arc<dyn ObjectStorage>> {
    let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(config.upload_dir.clone()).await?),
        StorageBackend::S3 => Arc::new(S3Storage::from_config(config).await?),
    };
    Ok(storage)
}

/// Files kept as plain entries of one directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .with_context(|| format!("failed to create upload directory {}", root.display()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if matches!(key, "" | "." | "..") || key.contains(['/', '\\']) {
            bail!("invalid storage key {key:?}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: Option<String>,
        _content_disposition: Option<String>,
    ) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed to delete {}", path.display())),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// `Content-Disposition` value offering the original name as download name.
pub fn attachment_content_disposition(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let sanitized: String = filename
        .chars()
        .map(|ch| match ch {
            '"' | '\\' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();

    let encoded =
        percent_encoding::utf8_percent_encode(&sanitized, percent_encoding::NON_ALPHANUMERIC);
    Some(format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized, encoded
    ))
}

/// Strips any client-side directory components.
pub fn original_basename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Shortens `name` to at most `max_chars` characters, keeping a short
/// extension intact.
pub fn truncate_filename(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(index) if index > 0 && name[index..].chars().count() <= MAX_EXTENSION_CHARS => {
            name.split_at(index)
        }
        _ => (name, ""),
    };
    let keep = max_chars.saturating_sub(extension.chars().count());
    let mut truncated: String = stem.chars().take(keep).collect();
    truncated.push_str(extension);
    truncated
}

/// `{uuid}_{sanitized name}`; the random prefix keeps concurrent uploads of
/// the same file apart.
pub fn storage_name_for(original: &str) -> String {
    let sanitized = sanitize_filename(&original_basename(original));
    let sanitized = truncate_filename(&sanitized, MAX_STORED_NAME_CHARS);
    format!("{}_{}", Uuid::new_v4(), sanitized)
}
