//! Current profile photo per user, mirrored as `<static>/<user_id>.jpg`.

use crate::media::{MediaError, download_atomically};
use crate::telegram::{ApiError, Messenger};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
struct PhotoEntry {
    file_id: String,
    short_name: String,
}

pub struct UserPhotoCache {
    messenger: Arc<dyn Messenger>,
    static_dir: PathBuf,
    photos: DashMap<i64, PhotoEntry>,
}

fn short_name(user_id: i64) -> String {
    format!("{user_id}.jpg")
}

impl UserPhotoCache {
    pub fn new(messenger: Arc<dyn Messenger>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            messenger,
            static_dir: static_dir.into(),
            photos: DashMap::new(),
        }
    }

    /// Fetch the user's current profile photo.
    ///
    /// Returns the short name, or `None` when the user has no photo. The
    /// download is skipped when the photo has not changed since the last
    /// refresh and the local copy still exists.
    pub async fn refresh(&self, user_id: i64) -> Result<Option<String>, MediaError> {
        let photos = self.messenger.get_user_profile_photos(user_id).await?;
        let Some(file_id) = photos.current_photo_id().map(str::to_string) else {
            return Ok(None);
        };

        let name = short_name(user_id);
        let dest = self.static_dir.join(&name);

        let unchanged = self
            .photos
            .get(&user_id)
            .is_some_and(|entry| entry.file_id == file_id);
        if unchanged && tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            return Ok(Some(name));
        }

        let meta = self.messenger.get_file(&file_id).await?;
        let remote = meta
            .file_path
            .as_deref()
            .ok_or_else(|| ApiError::MissingFilePath(file_id.clone()))?;

        tokio::fs::create_dir_all(&self.static_dir).await?;
        let bytes = download_atomically(self.messenger.as_ref(), remote, &dest).await?;
        crate::metrics::record_media("profile_photo", "downloaded", bytes);
        debug!(user_id, bytes, "Profile photo refreshed");

        self.photos.insert(
            user_id,
            PhotoEntry {
                file_id,
                short_name: name.clone(),
            },
        );
        Ok(Some(name))
    }

    /// Short name of the user's photo, if one has been mirrored.
    pub async fn filename(&self, user_id: i64) -> Option<String> {
        if let Some(entry) = self.photos.get(&user_id) {
            return Some(entry.short_name.clone());
        }
        let name = short_name(user_id);
        tokio::fs::try_exists(self.static_dir.join(&name))
            .await
            .unwrap_or(false)
            .then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::fake::FakeMessenger;

    #[tokio::test]
    async fn refresh_downloads_once_per_photo() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger::new());
        let photos = UserPhotoCache::new(fake.clone(), dir.path());
        fake.add_profile_photo(42, "p1", b"face");

        assert_eq!(photos.refresh(42).await.unwrap().as_deref(), Some("42.jpg"));
        assert_eq!(photos.refresh(42).await.unwrap().as_deref(), Some("42.jpg"));
        assert_eq!(fake.downloads(), 1);
        assert_eq!(tokio::fs::read(dir.path().join("42.jpg")).await.unwrap(), b"face");

        fake.add_profile_photo(42, "p2", b"new face");
        photos.refresh(42).await.unwrap();
        assert_eq!(fake.downloads(), 2);
    }

    #[tokio::test]
    async fn no_photo_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMessenger::new());
        let photos = UserPhotoCache::new(fake, dir.path());

        assert_eq!(photos.refresh(7).await.unwrap(), None);
        assert_eq!(photos.filename(7).await, None);
    }

    #[tokio::test]
    async fn filename_finds_files_from_previous_runs() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("9.jpg"), b"old").await.unwrap();
        let photos = UserPhotoCache::new(Arc::new(FakeMessenger::new()), dir.path());

        assert_eq!(photos.filename(9).await.as_deref(), Some("9.jpg"));
    }
}
