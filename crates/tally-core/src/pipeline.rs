use tokio::sync::watch;
use tracing::debug;

use crate::filter::FilterSpec;
use crate::prefs::FilterPrefs;
use crate::store::{LiveQuery, TaskStore, WeakTaskStore};
use crate::task::Task;

/// The single live task-list output: combines the search text and the
/// preference pair into a filter spec and keeps exactly one store
/// subscription open for it, switching to a fresh one whenever the spec
/// changes and discarding anything the stale subscription had left.
pub struct TaskListStream {
    store: WeakTaskStore,
    search: watch::Receiver<String>,
    prefs: watch::Receiver<FilterPrefs>,
    active: Option<LiveQuery>,
    spec: FilterSpec,
    search_open: bool,
    prefs_open: bool,
}

enum Wake {
    Search(Result<(), watch::error::RecvError>),
    Prefs(Result<(), watch::error::RecvError>),
    Emit(Option<Vec<Task>>),
}

impl TaskListStream {
    pub(crate) fn new(
        store: &TaskStore,
        mut search: watch::Receiver<String>,
        mut prefs: watch::Receiver<FilterPrefs>,
    ) -> Self {
        let spec = FilterSpec::new(
            search.borrow_and_update().clone(),
            *prefs.borrow_and_update(),
        );
        let active = Some(store.watch(spec.clone()));
        Self {
            store: store.downgrade(),
            search,
            prefs,
            active,
            spec,
            search_open: true,
            prefs_open: true,
        }
    }

    /// Next task-list snapshot. `None` once the owning session is gone;
    /// after that, every call returns `None`.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        loop {
            let wake = {
                let Self {
                    search,
                    prefs,
                    active,
                    search_open,
                    prefs_open,
                    ..
                } = self;
                let query = active.as_mut()?;

                tokio::select! {
                    changed = search.changed(), if *search_open => Wake::Search(changed),
                    changed = prefs.changed(), if *prefs_open => Wake::Prefs(changed),
                    list = query.next() => Wake::Emit(list),
                }
            };

            match wake {
                Wake::Search(Ok(())) | Wake::Prefs(Ok(())) => self.refresh(),
                Wake::Search(Err(_)) => self.search_open = false,
                Wake::Prefs(Err(_)) => self.prefs_open = false,
                Wake::Emit(None) => {
                    self.active = None;
                    return None;
                }
                Wake::Emit(list @ Some(_)) => return list,
            }
        }
    }

    // Recompute the spec from the latest value of both inputs; only an
    // actual change swaps the subscription.
    fn refresh(&mut self) {
        let spec = FilterSpec::new(
            self.search.borrow_and_update().clone(),
            *self.prefs.borrow_and_update(),
        );
        if spec == self.spec {
            return;
        }

        debug!(
            query = %spec.query,
            sort_order = ?spec.sort_order,
            hide_completed = spec.hide_completed,
            "filter changed; switching live query"
        );
        self.spec = spec.clone();

        // The stale subscription is cancelled before its replacement opens,
        // so at most one is ever live.
        self.active = None;
        if let Some(store) = self.store.upgrade() {
            self.active = Some(store.watch(spec));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use tokio::sync::watch;

    use super::TaskListStream;
    use crate::prefs::{FilterPrefs, PreferenceStore, SortOrder};
    use crate::store::TaskStore;
    use crate::task::Task;

    fn at(minute: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
    }

    async fn seeded_store() -> TaskStore {
        let store = TaskStore::in_memory();
        store.insert(Task::new("wash", false, at(0))).await.unwrap();
        store.insert(Task::new("buy milk", true, at(1))).await.unwrap();
        store
    }

    #[tokio::test]
    async fn emits_the_initial_snapshot_immediately() {
        let store = seeded_store().await;
        let prefs = PreferenceStore::in_memory();
        let (_search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        let tasks = stream.next().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "buy milk");
    }

    #[tokio::test]
    async fn search_change_switches_to_a_matching_snapshot() {
        let store = seeded_store().await;
        let prefs = PreferenceStore::in_memory();
        let (search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        stream.next().await.unwrap();

        search_tx.send_replace("wash".to_string());
        let tasks = stream.next().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "wash");
    }

    #[tokio::test]
    async fn sort_order_flip_reorders_without_stale_emissions() {
        let store = TaskStore::in_memory();
        store.insert(Task::new("b", false, at(0))).await.unwrap();
        store.insert(Task::new("a", false, at(1))).await.unwrap();
        let prefs = PreferenceStore::in_memory();
        let (_search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        let by_date = stream.next().await.unwrap();
        assert_eq!(by_date[0].name, "b");

        prefs.set_sort_order(SortOrder::ByName).await.unwrap();
        let by_name = stream.next().await.unwrap();
        assert_eq!(by_name[0].name, "a");
    }

    #[tokio::test]
    async fn unchanged_inputs_do_not_produce_an_emission() {
        let store = seeded_store().await;
        let prefs = PreferenceStore::in_memory();
        let (search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        stream.next().await.unwrap();

        // Same value again: the recomputed spec is equal, so no new
        // subscription and nothing to emit.
        search_tx.send_replace(String::new());
        prefs.set_hide_completed(false).await.unwrap();
        let waited =
            tokio::time::timeout(Duration::from_millis(50), stream.next()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn stream_ends_after_the_store_is_gone() {
        let store = seeded_store().await;
        let prefs = PreferenceStore::in_memory();
        let (_search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        stream.next().await.unwrap();

        drop(store);
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn closed_inputs_keep_the_active_subscription_serving() {
        let store = seeded_store().await;
        let prefs = PreferenceStore::in_memory();
        let (search_tx, search_rx) = watch::channel(String::new());

        let mut stream = TaskListStream::new(&store, search_rx, prefs.subscribe());
        stream.next().await.unwrap();

        drop(search_tx);
        store.insert(Task::new("late", false, at(2))).await.unwrap();
        let tasks = stream.next().await.unwrap();
        assert_eq!(tasks.len(), 3);
    }

    #[tokio::test]
    async fn prefs_default_to_filter_prefs_default() {
        assert_eq!(
            FilterPrefs::default(),
            FilterPrefs {
                sort_order: SortOrder::ByDate,
                hide_completed: false,
            }
        );
    }
}
