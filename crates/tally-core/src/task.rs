use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    #[serde(default)]
    pub id: Option<i64>,

    pub name: String,

    #[serde(default)]
    pub important: bool,

    #[serde(default)]
    pub completed: bool,

    pub created: DateTime<Utc>,
}

impl Task {
    pub fn new(name: impl Into<String>, important: bool, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: name.into(),
            important,
            completed: false,
            created: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Creation date as shown by the edit screen.
    pub fn created_display(&self) -> String {
        self.created.format("%Y-%m-%d %H:%M").to_string()
    }
}
