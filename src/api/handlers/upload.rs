//! Spooling of multipart file fields to local temp files.
//!
//! The media store consumes files by path, so uploaded parts are written to
//! the OS temp directory first. A spooled file removes itself on drop; when
//! the media store already moved it away the removal is a no-op.

use axum::extract::multipart::Field;
use std::env;
use std::path::{Path, PathBuf};
use ulid::Ulid;

use crate::api::error::AuthError;
use crate::api::media::sanitized_extension;

pub(crate) struct SpooledUpload {
    path: PathBuf,
}

impl SpooledUpload {
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SpooledUpload {
    fn drop(&mut self) {
        // Best effort: the file is gone already when the upload succeeded.
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Write one multipart file field to a temp file.
///
/// Returns `None` for an empty part (browsers send empty parts for file
/// inputs left blank).
pub(crate) async fn spool_field(field: Field<'_>) -> Result<Option<SpooledUpload>, AuthError> {
    let original_name = field.file_name().map(ToString::to_string);
    let bytes = field
        .bytes()
        .await
        .map_err(|_| AuthError::validation("Malformed multipart payload"))?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let extension = original_name
        .as_deref()
        .and_then(|name| sanitized_extension(Path::new(name)));
    let file_name = match extension {
        Some(ext) => format!("vidra-upload-{}.{ext}", Ulid::new()),
        None => format!("vidra-upload-{}", Ulid::new()),
    };
    let path = env::temp_dir().join(file_name);

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|err| AuthError::Internal(anyhow::anyhow!("failed to spool upload: {err}")))?;

    Ok(Some(SpooledUpload { path }))
}
