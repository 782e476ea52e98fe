use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::event::{ADD_TASK_RESULT_OK, EDIT_TASK_RESULT_OK, EventSender, TaskEvent};
use crate::prefs::{PreferenceStore, SortOrder};
use crate::store::{StoreError, TaskStore};
use crate::task::Task;

/// Single mediation point between user commands and the stores. Stateless
/// between commands apart from the outbound event queue; clones share both.
#[derive(Debug, Clone)]
pub struct Coordinator {
    store: TaskStore,
    prefs: PreferenceStore,
    search: Arc<watch::Sender<String>>,
    events: EventSender,
}

impl Coordinator {
    pub(crate) fn new(
        store: TaskStore,
        prefs: PreferenceStore,
        search: Arc<watch::Sender<String>>,
        events: EventSender,
    ) -> Self {
        Self {
            store,
            prefs,
            search,
            events,
        }
    }

    #[instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn select_task(&self, task: Task) {
        self.events.send(TaskEvent::NavigateToEdit(task)).await;
    }

    #[instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn toggle_completed(&self, task: &Task, completed: bool) {
        let mut updated = task.clone();
        updated.completed = completed;
        self.surface(self.store.update(updated).await).await;
    }

    /// The task is removed immediately; the undo window is only the
    /// snapshot travelling inside the event.
    #[instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn swipe_delete(&self, task: Task) {
        if self.surface(self.store.delete(&task).await).await.is_some() {
            self.events.send(TaskEvent::ShowUndoMessage(task)).await;
        }
    }

    /// Re-insert the deleted snapshot verbatim. The store replaces any row
    /// that meanwhile took the same id.
    #[instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn undo(&self, task: Task) {
        self.surface(self.store.insert(task).await).await;
    }

    pub async fn add_task_requested(&self) {
        self.events.send(TaskEvent::NavigateToAdd).await;
    }

    pub async fn delete_completed_requested(&self) {
        self.events
            .send(TaskEvent::NavigateToConfirmDeleteCompleted)
            .await;
    }

    /// The confirmed half of the bulk delete; the request above only
    /// navigates.
    #[instrument(skip(self))]
    pub async fn confirm_delete_completed(&self) {
        self.surface(self.store.delete_completed().await).await;
    }

    #[instrument(skip(self, existing), fields(existing_id = ?existing.as_ref().and_then(|t| t.id)))]
    pub async fn save_edit(&self, name: &str, important: bool, existing: Option<Task>) {
        if name.trim().is_empty() {
            debug!("rejecting blank task name");
            self.events
                .send(TaskEvent::ShowInvalidInput("Name cannot be empty".to_string()))
                .await;
            return;
        }

        match existing {
            Some(task) => {
                let mut updated = task;
                updated.name = name.to_string();
                updated.important = important;
                if self.surface(self.store.update(updated).await).await.is_some() {
                    self.events
                        .send(TaskEvent::NavigateBack(EDIT_TASK_RESULT_OK))
                        .await;
                }
            }
            None => {
                let task = Task::new(name, important, Utc::now());
                if self.surface(self.store.insert(task).await).await.is_some() {
                    self.events
                        .send(TaskEvent::NavigateBack(ADD_TASK_RESULT_OK))
                        .await;
                }
            }
        }
    }

    /// Unrecognized codes are ignored, matching the permissive handling of
    /// presentation-layer result codes.
    pub async fn edit_result_acknowledged(&self, result: i32) {
        let message = match result {
            ADD_TASK_RESULT_OK => "Task added",
            EDIT_TASK_RESULT_OK => "Task updated",
            other => {
                debug!(result = other, "ignoring unrecognized edit result");
                return;
            }
        };
        info!(result, message, "edit result acknowledged");
        self.events
            .send(TaskEvent::ShowTaskSavedMessage(message.to_string()))
            .await;
    }

    pub fn search_text_changed(&self, text: impl Into<String>) {
        self.search.send_replace(text.into());
    }

    pub async fn sort_order_changed(&self, sort_order: SortOrder) {
        if let Err(err) = self.prefs.set_sort_order(sort_order).await {
            warn!(error = %err, "failed persisting sort order");
        }
    }

    pub async fn hide_completed_changed(&self, hide_completed: bool) {
        if let Err(err) = self.prefs.set_hide_completed(hide_completed).await {
            warn!(error = %err, "failed persisting hide-completed flag");
        }
    }

    // Store failures become a user-visible event instead of propagating.
    async fn surface<T>(&self, result: Result<T, StoreError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "store mutation failed");
                self.events
                    .send(TaskEvent::ShowStoreError(err.to_string()))
                    .await;
                None
            }
        }
    }
}
