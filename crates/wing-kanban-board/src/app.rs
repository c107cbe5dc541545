/*
[INPUT]:  Validated BoardConfig
[OUTPUT]: Wired TaskStore, optional change source, and reminder storage
[POS]:    Composition layer - builds the runtime graph shared by CLI commands
[UPDATE]: When adding backends or changing startup wiring
*/

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use wing_kanban_adapter::{KanbanClient, TaskRemote};

use crate::change_feed::{ChangeFeed, ChangeSource};
use crate::config::{Backend, BoardConfig};
use crate::local_remote::LocalTaskRemote;
use crate::realtime_source::RealtimeChangeSource;
use crate::reminders::ReminderList;
use crate::snapshot::SnapshotStore;
use crate::store::TaskStore;

/// Everything a command needs, built once from configuration
pub struct BoardApp {
    config: BoardConfig,
    snapshot: SnapshotStore,
    store: Arc<TaskStore>,
    change_source: Option<Arc<dyn ChangeSource>>,
}

impl BoardApp {
    pub fn from_config(config: BoardConfig) -> Result<Self> {
        let snapshot = SnapshotStore::new(config.storage.resolved_dir());

        let (remote, change_source): (Arc<dyn TaskRemote>, Option<Arc<dyn ChangeSource>>) =
            match config.backend {
                Backend::Remote => {
                    let url = config
                        .remote
                        .url
                        .as_deref()
                        .context("remote.url is not configured")?;
                    let api_key = config
                        .remote
                        .api_key
                        .as_deref()
                        .context("remote.api_key is not configured")?;
                    let client =
                        KanbanClient::with_config(config.remote.client_config(), url, api_key)
                            .context("build task table client")?;

                    let source = if config.realtime.enabled {
                        let source = RealtimeChangeSource::for_client(
                            &client,
                            config.realtime.socket_config(),
                            config.realtime.join_timeout(),
                        )
                        .context("derive realtime endpoint")?;
                        Some(Arc::new(source) as Arc<dyn ChangeSource>)
                    } else {
                        None
                    };
                    (Arc::new(client) as Arc<dyn TaskRemote>, source)
                }
                Backend::Local => {
                    let local = LocalTaskRemote::new(snapshot.clone());
                    (Arc::new(local) as Arc<dyn TaskRemote>, None)
                }
            };

        info!(
            backend = ?config.backend,
            data_dir = %snapshot.dir().display(),
            realtime = change_source.is_some(),
            "board wired"
        );

        let store = Arc::new(TaskStore::new(remote).with_snapshot(snapshot.clone()));
        Ok(Self {
            config,
            snapshot,
            store,
            change_source,
        })
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<TaskStore> {
        self.store.clone()
    }

    /// Start the change feed; `None` when realtime is disabled or unavailable
    pub fn start_change_feed(&self) -> Option<ChangeFeed> {
        let source = self.change_source.clone()?;
        Some(ChangeFeed::subscribe(
            source,
            self.store.clone(),
            self.config.realtime.feed_options(),
        ))
    }

    pub async fn reminders(&self) -> Result<ReminderList> {
        ReminderList::load(self.snapshot.clone())
            .await
            .context("load reminders")
    }
}

impl std::fmt::Debug for BoardApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardApp")
            .field("backend", &self.config.backend)
            .field("store", &self.store)
            .field("realtime", &self.change_source.is_some())
            .finish()
    }
}
