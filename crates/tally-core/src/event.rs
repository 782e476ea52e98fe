use tokio::sync::mpsc;
use tracing::debug;

use crate::task::Task;

/// Result codes handed back through presentation navigation when the edit
/// screen closes.
pub const ADD_TASK_RESULT_OK: i32 = 1;
pub const EDIT_TASK_RESULT_OK: i32 = 2;

// Small on purpose: one consumer drains it, a full queue applies
// backpressure to the producing command instead of growing without bound.
const EVENT_QUEUE_CAPACITY: usize = 16;

/// One-shot notifications for the presentation layer, consumed exactly once
/// and in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    NavigateToAdd,
    NavigateToEdit(Task),
    NavigateToConfirmDeleteCompleted,
    NavigateBack(i32),
    ShowUndoMessage(Task),
    ShowTaskSavedMessage(String),
    ShowInvalidInput(String),
    ShowStoreError(String),
}

/// Receiving half of the event queue. Not a replay log: a consumer attaching
/// late misses anything emitted before it, and each event is delivered once.
pub struct Events {
    rx: mpsc::Receiver<TaskEvent>,
}

impl Events {
    pub async fn recv(&mut self) -> Option<TaskEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<TaskEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct EventSender {
    tx: mpsc::Sender<TaskEvent>,
}

impl EventSender {
    /// Events emitted after the consumer is gone are discarded, not errored.
    pub(crate) async fn send(&self, event: TaskEvent) {
        if let Err(err) = self.tx.send(event).await {
            debug!(event = ?err.0, "event discarded; queue consumer is gone");
        }
    }
}

pub(crate) fn channel() -> (EventSender, Events) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (EventSender { tx }, Events { rx })
}
