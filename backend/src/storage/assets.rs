//! Local storage for uploaded product images.
//!
//! Images land in the upload directory under a collision-free name and are
//! served back by the static file layer under `/uploads`.

use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{AssetStore, StorageError};
use crate::domain::models::upload::{StoredAsset, UploadedImage};

const MAX_NAME_LENGTH: usize = 80;

#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalAssetStore {
    pub fn new(dir: impl AsRef<Path>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn unique_file_name(original: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            &token[..8],
            sanitize_file_name(original)
        )
    }
}

/// Keep ASCII letters, digits, dots, dashes and underscores; everything else becomes `_`
fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let safe: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let safe = safe.trim_matches('.');

    if safe.is_empty() {
        return "image".to_string();
    }

    // keep the extension when shortening
    if safe.len() > MAX_NAME_LENGTH {
        safe[safe.len() - MAX_NAME_LENGTH..].to_string()
    } else {
        safe.to_string()
    }
}

fn is_plain_file_name(public_id: &str) -> bool {
    !public_id.is_empty()
        && !public_id.contains(['/', '\\'])
        && public_id != "."
        && public_id != ".."
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn store(&self, image: &UploadedImage) -> Result<StoredAsset, StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let file_name = Self::unique_file_name(&image.file_name);
        tokio::fs::write(self.dir.join(&file_name), &image.bytes).await?;

        info!("Stored uploaded image {} ({} bytes)", file_name, image.len());
        Ok(StoredAsset {
            url: format!("{}/{}", self.url_prefix, file_name),
            public_id: file_name,
        })
    }

    async fn delete(&self, public_id: &str) -> Result<(), StorageError> {
        if !is_plain_file_name(public_id) {
            return Err(StorageError::InvalidAsset(public_id.to_string()));
        }

        match tokio::fs::remove_file(self.dir.join(public_id)).await {
            Ok(()) => {
                info!("Deleted uploaded image {}", public_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Uploaded image {} was already gone", public_id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
