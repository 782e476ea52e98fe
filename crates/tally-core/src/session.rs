use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use tokio::sync::watch;
use tracing::info;

use crate::coordinator::Coordinator;
use crate::event::{self, Events};
use crate::pipeline::TaskListStream;
use crate::prefs::PreferenceStore;
use crate::store::TaskStore;

/// One user-facing session: the whole dependency graph, built once. The
/// presentation layer drains `tasks` and `events` and issues commands
/// through clones of the coordinator. Dropping the session cancels the live
/// subscription and closes the event queue; commands still in flight on
/// coordinator clones complete, but their events are discarded.
pub struct Session {
    coordinator: Coordinator,
    pub tasks: TaskListStream,
    pub events: Events,
}

impl Session {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let store = TaskStore::open(data_dir).with_context(|| {
            format!("failed to open task store at {}", data_dir.display())
        })?;
        let prefs = PreferenceStore::open(data_dir);
        info!(data_dir = %data_dir.display(), "session ready");
        Ok(Self::assemble(store, prefs))
    }

    pub fn in_memory() -> Self {
        Self::assemble(TaskStore::in_memory(), PreferenceStore::in_memory())
    }

    fn assemble(store: TaskStore, prefs: PreferenceStore) -> Self {
        let (search_tx, search_rx) = watch::channel(String::new());
        let (events_tx, events) = event::channel();
        let tasks = TaskListStream::new(&store, search_rx, prefs.subscribe());
        let coordinator = Coordinator::new(store, prefs, Arc::new(search_tx), events_tx);
        Self {
            coordinator,
            tasks,
            events,
        }
    }

    pub fn coordinator(&self) -> Coordinator {
        self.coordinator.clone()
    }
}

pub fn default_data_dir() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(home.join(".tally"))
}
