use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use anyhow::Context;
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::filter::FilterSpec;
use crate::task::Task;

pub const TASKS_FILE: &str = "tasks.data";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt task data: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Observable task table, persisted as one JSONL file. Cheap to clone; all
/// clones share the same table and the same watchers.
#[derive(Debug, Clone)]
pub struct TaskStore {
    inner: Arc<Inner>,
}

/// Handle that does not keep the table alive; live queries hold one so a
/// torn-down session actually releases the store.
#[derive(Debug, Clone)]
pub struct WeakTaskStore {
    inner: Weak<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    table: Mutex<Table>,
    rev: watch::Sender<u64>,
}

#[derive(Debug)]
struct Table {
    tasks: Vec<Task>,
    next_id: i64,
}

impl TaskStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join(TASKS_FILE);
        if !path.exists() {
            fs::write(&path, "")?;
        }

        let tasks = load_jsonl(&path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        let next_id = tasks.iter().filter_map(|t| t.id).max().unwrap_or(0) + 1;

        info!(
            file = %path.display(),
            count = tasks.len(),
            next_id,
            "opened task store"
        );

        Ok(Self::from_parts(Some(path), tasks, next_id))
    }

    pub fn in_memory() -> Self {
        Self::from_parts(None, Vec::new(), 1)
    }

    fn from_parts(path: Option<PathBuf>, tasks: Vec<Task>, next_id: i64) -> Self {
        let (rev, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                path,
                table: Mutex::new(Table { tasks, next_id }),
                rev,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakTaskStore {
        WeakTaskStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Live query: the first `next()` yields the current snapshot for
    /// `spec`, every later one waits for a table mutation. Emits on every
    /// mutation, whether or not the filtered list changed. Dropping the
    /// handle closes the subscription.
    pub fn watch(&self, spec: FilterSpec) -> LiveQuery {
        debug!(query = %spec.query, sort_order = ?spec.sort_order, hide_completed = spec.hide_completed, "opening live query");
        LiveQuery {
            spec,
            rev: self.inner.rev.subscribe(),
            store: Arc::downgrade(&self.inner),
            primed: false,
        }
    }

    /// Assigns the next id when the task has none; an explicit id replaces
    /// any row already carrying it. Returns the task with its assigned id.
    #[tracing::instrument(skip(self, task), fields(id = ?task.id, name = %task.name))]
    pub async fn insert(&self, mut task: Task) -> Result<Task, StoreError> {
        self.inner.mutate(|table| {
            match task.id {
                None => {
                    task.id = Some(table.next_id);
                    table.next_id += 1;
                    table.tasks.push(task.clone());
                }
                Some(id) => {
                    if let Some(slot) = table.tasks.iter_mut().find(|t| t.id == Some(id)) {
                        *slot = task.clone();
                    } else {
                        table.tasks.push(task.clone());
                    }
                    table.next_id = table.next_id.max(id + 1);
                }
            }
            true
        })?;
        debug!(id = ?task.id, "task inserted");
        Ok(task)
    }

    /// Replaces the row with the same id. A row that no longer exists, or a
    /// task never persisted, is left alone.
    #[tracing::instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn update(&self, task: Task) -> Result<(), StoreError> {
        let Some(id) = task.id else {
            warn!("ignoring update of unpersisted task");
            return Ok(());
        };

        self.inner.mutate(|table| {
            match table.tasks.iter_mut().find(|t| t.id == Some(id)) {
                Some(slot) => {
                    *slot = task.clone();
                    true
                }
                None => {
                    warn!(id, "ignoring update of missing task");
                    false
                }
            }
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self, task), fields(id = ?task.id))]
    pub async fn delete(&self, task: &Task) -> Result<(), StoreError> {
        let Some(id) = task.id else {
            return Ok(());
        };

        self.inner.mutate(|table| {
            let before = table.tasks.len();
            table.tasks.retain(|t| t.id != Some(id));
            table.tasks.len() != before
        })?;
        Ok(())
    }

    /// Removes every completed row, returning how many went away.
    #[tracing::instrument(skip(self))]
    pub async fn delete_completed(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        self.inner.mutate(|table| {
            let before = table.tasks.len();
            table.tasks.retain(|t| !t.completed);
            removed = before - table.tasks.len();
            removed > 0
        })?;
        info!(removed, "deleted completed tasks");
        Ok(removed)
    }
}

impl WeakTaskStore {
    pub fn upgrade(&self) -> Option<TaskStore> {
        self.inner.upgrade().map(|inner| TaskStore { inner })
    }
}

impl Inner {
    // Runs `apply` on a scratch copy, persists, then commits and notifies.
    // A failed write leaves both the table and the watchers untouched.
    fn mutate(&self, apply: impl FnOnce(&mut Table) -> bool) -> Result<(), StoreError> {
        let mut table = self.table.lock().expect("task table lock poisoned");

        let mut scratch = Table {
            tasks: table.tasks.clone(),
            next_id: table.next_id,
        };
        let changed = apply(&mut scratch);

        if let Some(path) = &self.path {
            save_jsonl_atomic(path, &scratch.tasks)?;
        }

        *table = scratch;
        drop(table);

        if changed {
            self.rev.send_modify(|rev| *rev += 1);
        }
        Ok(())
    }

    fn snapshot(&self, spec: &FilterSpec) -> Vec<Task> {
        let table = self.table.lock().expect("task table lock poisoned");
        spec.apply(&table.tasks)
    }
}

/// One active subscription to the task table. At most one of these is held
/// per pipeline output; swapping the filter drops the old handle.
pub struct LiveQuery {
    spec: FilterSpec,
    rev: watch::Receiver<u64>,
    store: Weak<Inner>,
    primed: bool,
}

impl LiveQuery {
    /// `None` once every strong handle to the store is gone.
    pub async fn next(&mut self) -> Option<Vec<Task>> {
        if self.primed && self.rev.changed().await.is_err() {
            return None;
        }
        self.primed = true;
        self.rev.borrow_and_update();

        let inner = self.store.upgrade()?;
        Some(inner.snapshot(&self.spec))
    }
}

fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Task>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let task: Task = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(task);
    }

    Ok(out)
}

fn save_jsonl_atomic(path: &Path, tasks: &[Task]) -> Result<(), StoreError> {
    debug!(file = %path.display(), count = tasks.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for task in tasks {
        let serialized = serde_json::to_string(task)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}
