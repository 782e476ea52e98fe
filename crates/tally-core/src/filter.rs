use std::cmp::Ordering;

use tracing::trace;

use crate::prefs::{FilterPrefs, SortOrder};
use crate::task::Task;

/// The tuple that fully determines one task-list query: search text plus the
/// two persisted preferences. Recomputed by the pipeline whenever any input
/// changes; two equal specs describe the same query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterSpec {
    pub query: String,
    pub sort_order: SortOrder,
    pub hide_completed: bool,
}

impl FilterSpec {
    pub fn new(query: impl Into<String>, prefs: FilterPrefs) -> Self {
        Self {
            query: query.into(),
            sort_order: prefs.sort_order,
            hide_completed: prefs.hide_completed,
        }
    }

    /// Case-sensitive substring match on the name, plus the hide-completed
    /// cut. An empty query matches everything.
    pub fn matches(&self, task: &Task) -> bool {
        let ok = task.name.contains(&self.query) && !(self.hide_completed && task.completed);
        trace!(id = ?task.id, name = %task.name, ok, "filter predicate evaluation");
        ok
    }

    /// Important tasks always sort first; ties fall back to the selected
    /// order.
    pub fn cmp_tasks(&self, a: &Task, b: &Task) -> Ordering {
        b.important
            .cmp(&a.important)
            .then_with(|| match self.sort_order {
                SortOrder::ByName => a.name.cmp(&b.name),
                SortOrder::ByDate => a.created.cmp(&b.created),
            })
    }

    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let mut out: Vec<Task> = tasks
            .iter()
            .filter(|task| self.matches(task))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.cmp_tasks(a, b));
        out
    }
}
