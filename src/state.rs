//! Shared service state.
//!
//! Every long-lived component is built once in `main` and reachable from
//! here. Handlers, the update loop and the web view all hold an
//! `Arc<AppState>`.

use crate::archive::{Archive, Courier};
use crate::cache::{FeedLockRegistry, FileNameCache, UserPhotoCache};
use crate::config::Config;
use crate::db::{Database, DbError};
use crate::feeds::{FeedIngestion, FeedSource};
use crate::media::MediaPipeline;
use crate::security::{FloodEngine, TimedAbuseCache};
use crate::telegram::Messenger;
use chatlog_proto::User;
use std::sync::Arc;

pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    /// The bot's own account.
    pub me: User,
    pub messenger: Arc<dyn Messenger>,
    pub archive: Arc<Archive>,
    pub courier: Arc<Courier>,
    pub files: Arc<FileNameCache>,
    pub photos: Arc<UserPhotoCache>,
    pub abuse: Arc<TimedAbuseCache>,
    pub flood: Arc<FloodEngine>,
    pub feeds: Arc<FeedIngestion>,
}

impl AppState {
    /// Wire every component together.
    ///
    /// The abuse cache is loaded from the store; the file name cache is
    /// returned cold and should be warmed by the caller.
    pub async fn build(
        config: Arc<Config>,
        db: Database,
        me: User,
        messenger: Arc<dyn Messenger>,
        feed_source: Arc<dyn FeedSource>,
    ) -> Result<Self, DbError> {
        let static_dir = config.storage.static_dir();

        let files = Arc::new(FileNameCache::new(db.clone(), Arc::clone(&messenger)));
        let photos = Arc::new(UserPhotoCache::new(Arc::clone(&messenger), &static_dir));
        let media = Arc::new(MediaPipeline::new(
            Arc::clone(&messenger),
            Arc::clone(&files),
            &static_dir,
        ));
        let archive = Arc::new(Archive::new(db.clone(), media, Arc::clone(&photos)));
        let courier = Arc::new(Courier::new(Arc::clone(&messenger), Arc::clone(&archive)));

        let abuse = Arc::new(TimedAbuseCache::load(db.clone(), config.flood.cooldown()).await?);
        let flood = Arc::new(FloodEngine::new(
            db.clone(),
            Arc::clone(&messenger),
            Arc::clone(&abuse),
            me.id,
            config.flood.max_level,
        ));
        let feeds = Arc::new(FeedIngestion::new(
            db.clone(),
            feed_source,
            Arc::clone(&courier),
            Arc::new(FeedLockRegistry::new()),
        ));

        Ok(Self {
            config,
            db,
            me,
            messenger,
            archive,
            courier,
            files,
            photos,
            abuse,
            flood,
            feeds,
        })
    }

    /// The bot's username, used to tell which commands are addressed to it.
    pub fn username(&self) -> &str {
        self.me.username.as_deref().unwrap_or_default()
    }
}
