//! Durable storage for downloaded images.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use articlesmith_shared::{ArticlesmithError, Result};

/// Prefix of every handle returned by [`FsAssetStore`].
const HANDLE_PREFIX: &str = "assets";

/// Persists image bytes and hands back an opaque reference.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn store(&self, bytes: &[u8], content_type: Option<&str>) -> Result<String>;
}

/// Content-addressed store: `<dir>/<sha256>.<ext>`, handle `assets/<sha256>.<ext>`.
pub struct FsAssetStore {
    dir: PathBuf,
}

impl FsAssetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    async fn store(&self, bytes: &[u8], content_type: Option<&str>) -> Result<String> {
        let hash = format!("{:x}", Sha256::digest(bytes));
        let file_name = format!("{hash}.{}", extension_for(content_type));

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ArticlesmithError::io(&self.dir, e))?;

        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ArticlesmithError::io(&path, e))?;

        debug!(path = %path.display(), bytes = bytes.len(), "asset stored");
        Ok(format!("{HANDLE_PREFIX}/{file_name}"))
    }
}

/// File extension for an image content type, `jpg` when unknown.
fn extension_for(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match mime.as_deref() {
        Some("image/png") => "png",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        Some("image/avif") => "avif",
        _ => "jpg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("as_assets_{}", Uuid::now_v7()))
    }

    #[test]
    fn extensions() {
        assert_eq!(extension_for(Some("image/png")), "png");
        assert_eq!(extension_for(Some("image/WEBP; charset=binary")), "webp");
        assert_eq!(extension_for(Some("image/jpeg")), "jpg");
        assert_eq!(extension_for(Some("application/octet-stream")), "jpg");
        assert_eq!(extension_for(None), "jpg");
    }

    #[tokio::test]
    async fn stores_content_addressed_files() {
        let dir = temp_dir();
        let store = FsAssetStore::new(&dir);

        let handle = store.store(b"fake-png", Some("image/png")).await.unwrap();
        let hash = format!("{:x}", Sha256::digest(b"fake-png"));
        assert_eq!(handle, format!("assets/{hash}.png"));

        let on_disk = std::fs::read(dir.join(format!("{hash}.png"))).unwrap();
        assert_eq!(on_disk, b"fake-png");

        // Same bytes, same handle.
        let again = store.store(b"fake-png", Some("image/png")).await.unwrap();
        assert_eq!(again, handle);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
