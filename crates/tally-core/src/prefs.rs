use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const PREFS_FILE: &str = "prefs.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    ByName,
    #[default]
    ByDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FilterPrefs {
    pub sort_order: SortOrder,
    pub hide_completed: bool,
}

/// Observable settings store. Cheap to clone; all clones share one value.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: Option<PathBuf>,
    tx: watch::Sender<FilterPrefs>,
}

impl PreferenceStore {
    /// Opens the preference file inside `data_dir`. A missing, unreadable or
    /// malformed file is a transient read failure: the defaults are
    /// substituted and the store stays usable.
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Self {
        let path = data_dir.join(PREFS_FILE);
        let prefs = load_prefs(&path);
        debug!(
            file = %path.display(),
            sort_order = ?prefs.sort_order,
            hide_completed = prefs.hide_completed,
            "opened preference store"
        );
        Self::from_parts(Some(path), prefs)
    }

    pub fn in_memory() -> Self {
        Self::from_parts(None, FilterPrefs::default())
    }

    fn from_parts(path: Option<PathBuf>, prefs: FilterPrefs) -> Self {
        let (tx, _rx) = watch::channel(prefs);
        Self {
            inner: Arc::new(Inner { path, tx }),
        }
    }

    pub fn current(&self) -> FilterPrefs {
        *self.inner.tx.borrow()
    }

    /// Live stream of the current preferences: the first `next()` yields
    /// immediately, later calls wait for a change.
    pub fn read(&self) -> PrefsStream {
        PrefsStream {
            rx: self.subscribe(),
            primed: false,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterPrefs> {
        self.inner.tx.subscribe()
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_sort_order(&self, sort_order: SortOrder) -> anyhow::Result<()> {
        self.edit(|prefs| prefs.sort_order = sort_order)
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_hide_completed(&self, hide_completed: bool) -> anyhow::Result<()> {
        self.edit(|prefs| prefs.hide_completed = hide_completed)
    }

    // Watchers are notified before the file write so the UI reacts even when
    // the disk is sick; the write failure is still reported to the caller.
    fn edit(&self, apply: impl FnOnce(&mut FilterPrefs)) -> anyhow::Result<()> {
        let mut next = *self.inner.tx.borrow();
        apply(&mut next);
        self.inner.tx.send_replace(next);

        if let Some(path) = &self.inner.path {
            save_prefs(path, &next)
                .with_context(|| format!("failed writing {}", path.display()))?;
        }
        Ok(())
    }
}

pub struct PrefsStream {
    rx: watch::Receiver<FilterPrefs>,
    primed: bool,
}

impl PrefsStream {
    pub async fn next(&mut self) -> Option<FilterPrefs> {
        if self.primed && self.rx.changed().await.is_err() {
            return None;
        }
        self.primed = true;
        Some(*self.rx.borrow_and_update())
    }
}

fn load_prefs(path: &Path) -> FilterPrefs {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return FilterPrefs::default();
        }
        Err(err) => {
            warn!(file = %path.display(), error = %err, "failed reading preferences; using defaults");
            return FilterPrefs::default();
        }
    };

    match toml::from_str(&text) {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(file = %path.display(), error = %err, "malformed preference file; using defaults");
            FilterPrefs::default()
        }
    }
}

fn save_prefs(path: &Path, prefs: &FilterPrefs) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(toml::to_string_pretty(prefs)?.as_bytes())?;
    temp.flush()?;
    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}
