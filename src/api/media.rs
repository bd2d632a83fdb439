//! Media storage for avatar and cover images.
//!
//! The uploader contract mirrors the object-storage collaborator the session
//! core consumes: hand it a local file, get back a public URL or `None`.
//! `None` covers the "input never existed" case; infrastructure failures are
//! real errors. Callers decide whether a missing upload is fatal.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
}

/// Upload abstraction consumed by the session layer.
pub trait MediaStore: Send + Sync {
    /// Move a local file into durable media storage and return its public
    /// URL, or `None` when the local file is absent.
    ///
    /// # Errors
    /// Returns an error when storage itself fails (destination not writable,
    /// copy failed).
    fn upload(&self, local_path: &Path) -> Result<Option<UploadedMedia>>;
}

/// Filesystem-backed store: files land under `media_root` with a fresh ULID
/// name and are served under `<public_base_url>/media/`.
#[derive(Debug, Clone)]
pub struct FsMediaStore {
    media_root: PathBuf,
    public_base_url: String,
}

impl FsMediaStore {
    #[must_use]
    pub fn new(media_root: PathBuf, public_base_url: String) -> Self {
        Self {
            media_root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl MediaStore for FsMediaStore {
    fn upload(&self, local_path: &Path) -> Result<Option<UploadedMedia>> {
        if !local_path.is_file() {
            warn!("upload source does not exist: {}", local_path.display());
            return Ok(None);
        }

        fs::create_dir_all(&self.media_root).with_context(|| {
            format!("failed to create media root {}", self.media_root.display())
        })?;

        let name = match sanitized_extension(local_path) {
            Some(ext) => format!("{}.{ext}", Ulid::new()),
            None => Ulid::new().to_string(),
        };
        let destination = self.media_root.join(&name);

        // Spooled uploads usually sit on the same filesystem, so a rename is
        // enough; fall back to copy+remove when it is not.
        if fs::rename(local_path, &destination).is_err() {
            fs::copy(local_path, &destination).with_context(|| {
                format!("failed to store media file {}", destination.display())
            })?;
            let _ = fs::remove_file(local_path);
        }

        Ok(Some(UploadedMedia {
            url: format!("{}/media/{name}", self.public_base_url),
        }))
    }
}

/// Keep only a short alphanumeric extension from the original file name.
pub(crate) fn sanitized_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}
