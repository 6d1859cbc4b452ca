//! Update poller.
//!
//! Long-polls the Bot API and fans every message out to its own tasks:
//! one archive save (with media and profile photo) and, for commands
//! addressed to this bot, one command dispatch. Nothing a task does can
//! stop the poller.

use crate::handlers::{Context, Registry};
use crate::state::AppState;
use crate::telegram::ApiError;
use chatlog_proto::{BotCommand, Message, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub struct Bot {
    state: Arc<AppState>,
    registry: Arc<Registry>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            registry: Arc::new(Registry::new()),
        }
    }

    /// Spawn the tasks for one update. Edits are not handled.
    pub fn handle_update(&self, update: Update) -> Vec<JoinHandle<()>> {
        crate::metrics::record_update();
        let update_id = update.update_id;
        let Some(msg) = update.into_message() else {
            debug!(update_id, "Ignoring update without a new message");
            return Vec::new();
        };

        let span = crate::telemetry::spans::update(update_id, msg.chat.id);
        let _enter = span.enter();

        let mut tasks = Vec::new();
        if self.addressed_command(&msg) {
            tasks.push(self.spawn_command(msg.clone(), span.clone()));
        }
        tasks.extend(self.state.archive.spawn_save(msg));
        tasks
    }

    fn addressed_command(&self, msg: &Message) -> bool {
        msg.text
            .as_deref()
            .and_then(BotCommand::parse)
            .is_some_and(|cmd| cmd.is_for(self.state.username()))
    }

    fn spawn_command(&self, msg: Message, span: tracing::Span) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let registry = Arc::clone(&self.registry);
        tokio::spawn(
            async move {
                let text = msg.text.as_deref().unwrap_or_default();
                let Some(command) = BotCommand::parse(text) else {
                    return;
                };
                let ctx = Context {
                    state: &state,
                    msg: &msg,
                    command: &command,
                };
                registry.dispatch(&ctx).await;
            }
            .instrument(span),
        )
    }

    /// Fetch one batch of updates starting at `offset` and hand each one
    /// off. Returns the offset for the next poll.
    pub async fn poll_once(&self, offset: i64) -> Result<i64, ApiError> {
        let updates = self
            .state
            .messenger
            .get_updates(offset, self.state.config.bot.poll_timeout())
            .await?;

        let mut next = offset;
        for update in updates {
            next = next.max(update.update_id + 1);
            self.handle_update(update);
        }
        Ok(next)
    }

    /// Poll forever.
    pub async fn run(self) {
        info!(username = self.state.username(), "Polling for updates");
        let mut offset = 0;
        let mut backoff = MIN_BACKOFF;
        loop {
            match self.poll_once(offset).await {
                Ok(next) => {
                    offset = next;
                    backoff = MIN_BACKOFF;
                }
                Err(e) => {
                    let wait = retry_delay(&e).unwrap_or(backoff);
                    if e.is_transient() {
                        warn!(error = %e, wait_secs = wait.as_secs(), "Polling failed, retrying");
                    } else {
                        error!(error = %e, wait_secs = wait.as_secs(), "Polling failed, retrying");
                    }
                    tokio::time::sleep(wait).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

/// Server-requested wait for flood-control rejections.
fn retry_delay(e: &ApiError) -> Option<Duration> {
    match e {
        ApiError::Api(e) => e.retry_after.map(Duration::from_secs),
        _ => None,
    }
}
