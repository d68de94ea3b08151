// =============================================================================
// models.rs — THE DATA THAT FLOWS THROUGH THE RADAR
// =============================================================================
//
// A task is one batch of report ids pasted by a human. Each report yields a
// ReportData (case numbers + a progress percentage), which gets cached on
// disk and later boiled down into ReportStats: how many overdue cases, and
// which courts they sit in.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle of a scraping task.
///
/// PENDING -> RUNNING -> COMPLETED | ERROR. The last two are final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "PENDING"),
            TaskStatus::Running => write!(f, "RUNNING"),
            TaskStatus::Completed => write!(f, "COMPLETED"),
            TaskStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// What a caller sees when polling a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskState {
    pub status: TaskStatus,
    pub message: String,
    /// Cache files of the reports that produced data, in completion order.
    pub result: Option<Vec<PathBuf>>,
    pub stats: Option<Vec<ReportStats>>,
    pub errors: Vec<String>,
}

impl TaskState {
    pub fn pending() -> Self {
        Self {
            status: TaskStatus::Pending,
            message: "Inicializando...".to_string(),
            result: None,
            stats: None,
            errors: Vec::new(),
        }
    }
}

/// Case numbers and progress harvested from one report page.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReportData {
    pub numbers: BTreeSet<String>,
    pub progress: String,
}

impl ReportData {
    pub fn new(numbers: impl IntoIterator<Item = String>, progress: impl Into<String>) -> Self {
        Self {
            numbers: numbers.into_iter().collect(),
            progress: progress.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// Court-level summary for one report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportStats {
    pub report_id: String,
    pub report_url: String,
    /// Numbers whose court could be identified.
    pub total_atrasados: u64,
    pub tribunais: BTreeMap<String, u64>,
    pub total_tribunais: usize,
    pub progress: String,
    pub numbers: Vec<String>,
}
