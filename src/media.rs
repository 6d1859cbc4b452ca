//! Media mirroring.
//!
//! Every attachment of an archived message is copied under the static
//! directory, at its short name. A file is downloaded at most once while its
//! size stays the same: a known short name whose local copy has the remote
//! size is a cache hit.
//!
//! Each attachment is fetched by its own task. Failures are logged and never
//! affect sibling attachments or the message save.

use crate::cache::FileNameCache;
use crate::db::DbError;
use crate::telegram::{ApiError, Messenger};
use chatlog_proto::{MediaKind, Message};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot resolve a local name for file {0}")]
    Unresolved(String),
}

/// Result of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The local copy was already current.
    Cached,
    /// The file was downloaded.
    Downloaded { bytes: u64 },
}

/// Resolve a short name under `root`, refusing anything that would escape it.
pub fn local_path(root: &Path, short_name: &str) -> Option<PathBuf> {
    let relative = Path::new(short_name);
    let mut components = relative.components().peekable();
    components.peek()?;
    components
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| root.join(relative))
}

/// Download `remote_path` to `dest` through a uniquely named temporary file
/// in the same directory, then rename it into place.
///
/// Readers never observe a partial file at `dest`.
pub async fn download_atomically(
    messenger: &dyn Messenger,
    remote_path: &str,
    dest: &Path,
) -> Result<u64, MediaError> {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MediaError::Unresolved(dest.display().to_string()))?;
    let tmp = dest.with_file_name(format!(".{file_name}.{}.part", uuid::Uuid::new_v4()));

    let bytes = match messenger.download_file(remote_path, &tmp).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
    };

    if let Err(e) = tokio::fs::rename(&tmp, dest).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(bytes)
}

/// Whether the local copy at `path` matches the remote size.
///
/// An unknown remote size matches any existing file.
async fn local_copy_matches(path: &Path, remote_size: Option<u64>) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => remote_size.is_none_or(|size| meta.len() == size),
        _ => false,
    }
}

/// Downloads message attachments into the static directory.
pub struct MediaPipeline {
    messenger: Arc<dyn Messenger>,
    files: Arc<FileNameCache>,
    static_dir: PathBuf,
}

impl MediaPipeline {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        files: Arc<FileNameCache>,
        static_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            messenger,
            files,
            static_dir: static_dir.into(),
        }
    }

    pub fn files(&self) -> &Arc<FileNameCache> {
        &self.files
    }

    /// Mirror one file.
    pub async fn fetch(&self, file_id: &str) -> Result<FetchOutcome, MediaError> {
        let meta = self.messenger.get_file(file_id).await?;

        let known = match self.files.lookup(file_id).await {
            Ok(known) => known,
            Err(e) => {
                warn!(file_id, error = %e, "File cache lookup failed");
                None
            }
        };
        let remote = meta.file_path.as_deref().filter(|p| !p.is_empty());

        let short_name = known
            .clone()
            .or_else(|| remote.map(str::to_string))
            .ok_or_else(|| MediaError::Unresolved(file_id.to_string()))?;
        let dest = local_path(&self.static_dir, &short_name)
            .ok_or_else(|| MediaError::Unresolved(short_name.clone()))?;

        if known.is_some() && local_copy_matches(&dest, meta.file_size).await {
            debug!(file_id, short_name = %short_name, "Media already mirrored");
            return Ok(FetchOutcome::Cached);
        }

        let remote = remote.ok_or_else(|| ApiError::MissingFilePath(file_id.to_string()))?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = download_atomically(self.messenger.as_ref(), remote, &dest).await?;

        if let Err(e) = self.files.remember(file_id, &short_name).await {
            warn!(file_id, error = %e, "Failed to store file name");
        }
        debug!(file_id, short_name = %short_name, bytes, "Media downloaded");
        Ok(FetchOutcome::Downloaded { bytes })
    }

    async fn fetch_logged(&self, kind: MediaKind, file_id: &str) {
        match self.fetch(file_id).await {
            Ok(FetchOutcome::Cached) => crate::metrics::record_media(kind.as_str(), "cached", 0),
            Ok(FetchOutcome::Downloaded { bytes }) => {
                crate::metrics::record_media(kind.as_str(), "downloaded", bytes)
            }
            Err(e) => {
                crate::metrics::record_media(kind.as_str(), "failed", 0);
                warn!(file_id, kind = kind.as_str(), error = %e, "Media fetch failed");
            }
        }
    }

    /// Start one fetch task per attachment of `msg`.
    pub fn spawn_for_message(self: &Arc<Self>, msg: &Message) -> Vec<JoinHandle<()>> {
        msg.media_refs()
            .into_iter()
            .map(|media| {
                let pipeline = Arc::clone(self);
                tokio::spawn(async move {
                    pipeline.fetch_logged(media.kind, &media.file_id).await;
                })
            })
            .collect()
    }
}
