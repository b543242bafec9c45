use std::path::{Path, PathBuf};

use actix_web::web::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::error::DomainError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Public mount point for stored files; references handed out by this
/// store are URLs under this prefix.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// A committed upload. The reference is only written to the database
/// after `commit` succeeds, so a reference can never point at a file
/// that was never stored.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Streams one image to durable storage under a unique filename and
    /// returns its reference. Non-image content types and bodies over
    /// `MAX_IMAGE_BYTES` are rejected while streaming, without buffering
    /// the whole body first.
    pub async fn commit<S, E>(
        &self,
        content_type: Option<&mime::Mime>,
        original_name: Option<&str>,
        body: S,
    ) -> Result<StoredImage, DomainError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let mime_type = content_type
            .ok_or_else(|| DomainError::Validation("upload is missing a content type".into()))?;
        if mime_type.type_() != mime::IMAGE {
            return Err(DomainError::Validation(
                "only image uploads are accepted".into(),
            ));
        }

        let file_name = unique_file_name(original_name, mime_type);
        let path = self.root.join(&file_name);
        let file = fs::File::create(&path)
            .await
            .map_err(|e| DomainError::Internal(format!("failed to create upload file: {}", e)))?;

        match write_body(file, body).await {
            Ok(written) => {
                info!(file = %file_name, bytes = written, "image committed");
                Ok(StoredImage {
                    reference: format!("{}/{}", PUBLIC_PREFIX, file_name),
                })
            }
            Err(err) => {
                discard(&path).await;
                Err(err)
            }
        }
    }

    /// Deletes a committed file whose surrounding record write failed.
    /// Best-effort: the request is already failing for another reason,
    /// so a cleanup failure is logged and swallowed.
    pub async fn rollback(&self, reference: &str) {
        let path = self.disk_path(reference);
        match fs::remove_file(&path).await {
            Ok(()) => info!(reference = %reference, "rolled back uncommitted upload"),
            Err(err) => warn!(reference = %reference, error = %err, "upload rollback failed"),
        }
    }

    /// Deletes the file behind a replaced or deleted product image.
    /// Best-effort with the same contract as `rollback`.
    pub async fn remove(&self, reference: &str) {
        let path = self.disk_path(reference);
        match fs::remove_file(&path).await {
            Ok(()) => info!(reference = %reference, "removed stored image"),
            Err(err) => warn!(reference = %reference, error = %err, "image removal failed"),
        }
    }

    /// References are URLs; only the final segment names a file under the
    /// store root, which also keeps traversal out of delete paths.
    fn disk_path(&self, reference: &str) -> PathBuf {
        let name = reference.rsplit('/').next().unwrap_or(reference);
        self.root.join(name)
    }
}

async fn write_body<S, E>(mut file: fs::File, mut body: S) -> Result<usize, DomainError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut written = 0usize;
    while let Some(chunk) = body.next().await {
        let chunk =
            chunk.map_err(|e| DomainError::Internal(format!("upload stream failed: {}", e)))?;
        written += chunk.len();
        if written > MAX_IMAGE_BYTES {
            return Err(DomainError::Validation(
                "image exceeds the 5 MiB limit".into(),
            ));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| DomainError::Internal(format!("failed to write upload: {}", e)))?;
    }
    file.flush()
        .await
        .map_err(|e| DomainError::Internal(format!("failed to flush upload: {}", e)))?;
    Ok(written)
}

async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to discard partial upload");
    }
}

/// Millisecond timestamp plus a random suffix keeps names unique under
/// concurrent uploads; the original extension is preserved for serving.
fn unique_file_name(original_name: Option<&str>, mime_type: &mime::Mime) -> String {
    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| mime_type.subtype().as_str().to_owned());
    format!(
        "{}-{}.{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        ext
    )
}
