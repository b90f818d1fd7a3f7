//! services/api/src/adapters/blob.rs
//!
//! Stores uploaded profile pictures and offer images on the local filesystem.
//! Files land under `<media_root>/<folder>/` and are served back by the
//! static file route mounted at the media URL.

use async_trait::async_trait;
use coderr_core::ports::{BlobStore, PortError, PortResult};
use std::path::PathBuf;
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        let mut url_prefix = url_prefix.to_string();
        if !url_prefix.ends_with('/') {
            url_prefix.push('/');
        }
        Self {
            root: root.into(),
            url_prefix,
        }
    }
}

/// Keeps the name safe to use as a single path segment.
fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, folder: &str, file_name: &str, data: &[u8]) -> PortResult<String> {
        let folder = sanitize_file_name(folder);
        let stored_name = format!("{}_{}", Uuid::new_v4().simple(), sanitize_file_name(file_name));

        let dir = self.root.join(&folder);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            error!("Failed to create media directory {:?}: {:?}", dir, e);
            PortError::Unexpected(e.to_string())
        })?;
        let path = dir.join(&stored_name);
        tokio::fs::write(&path, data).await.map_err(|e| {
            error!("Failed to write upload {:?}: {:?}", path, e);
            PortError::Unexpected(e.to_string())
        })?;
        debug!(path = ?path, bytes = data.len(), "stored upload");

        Ok(format!("{}{}/{}", self.url_prefix, folder, stored_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_cannot_escape_their_folder() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_file_name(".."), "upload");
    }

    #[tokio::test]
    async fn put_writes_under_the_root_and_returns_a_media_url() {
        let root = std::env::temp_dir().join(format!("coderr-blob-{}", Uuid::new_v4()));
        let store = FsBlobStore::new(&root, "/media");

        let url = store.put("offers", "logo.png", b"png-bytes").await.unwrap();
        assert!(url.starts_with("/media/offers/"));
        assert!(url.ends_with("_logo.png"));

        let stored_name = url.rsplit('/').next().unwrap();
        let written = tokio::fs::read(root.join("offers").join(stored_name)).await.unwrap();
        assert_eq!(written, b"png-bytes");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
