use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CheckIn, Task};

pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// One reversible mutation together with the state needed to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum UndoEntry {
    #[serde(rename_all = "camelCase")]
    AddCheckIn { id: String },
    #[serde(rename_all = "camelCase")]
    AddTask { id: String },
    #[serde(rename_all = "camelCase")]
    CheckIn {
        id: String,
        previous_last_check_in_date: Option<DateTime<Utc>>,
        previous_next_due_date: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    CompleteTask {
        id: String,
        previous_completed: bool,
        previous_completed_date: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    RemoveCheckIn { index: usize, record: CheckIn },
    #[serde(rename_all = "camelCase")]
    RemoveTask { index: usize, record: Task },
}

impl UndoEntry {
    pub fn describe(&self) -> String {
        match self {
            UndoEntry::AddCheckIn { id } => format!("add check-in {id}"),
            UndoEntry::AddTask { id } => format!("add task {id}"),
            UndoEntry::CheckIn { id, .. } => format!("check in {id}"),
            UndoEntry::CompleteTask { id, .. } => format!("complete task {id}"),
            UndoEntry::RemoveCheckIn { record, .. } => format!("remove check-in {}", record.id),
            UndoEntry::RemoveTask { record, .. } => format!("remove task {}", record.id),
        }
    }
}

/// Bounded history of recent mutations; the oldest entry is dropped once full.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UndoLog {
    capacity: usize,
    entries: VecDeque<UndoEntry>,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_UNDO_CAPACITY)
    }
}

impl UndoLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, entry: UndoEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Re-applies a capacity, trimming the oldest entries if needed.
    pub(crate) fn resize(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(id: &str) -> UndoEntry {
        UndoEntry::AddTask { id: id.to_string() }
    }

    #[test]
    fn drops_oldest_when_full() {
        let mut log = UndoLog::with_capacity(3);
        for id in ["a", "b", "c", "d"] {
            log.record(add(id));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.pop(), Some(add("d")));
        assert_eq!(log.pop(), Some(add("c")));
        assert_eq!(log.pop(), Some(add("b")));
        assert_eq!(log.pop(), None);
    }

    #[test]
    fn default_capacity_is_fifty() {
        let mut log = UndoLog::default();
        for i in 0..60 {
            log.record(add(&i.to_string()));
        }
        assert_eq!(log.len(), DEFAULT_UNDO_CAPACITY);
        assert_eq!(log.pop(), Some(add("59")));
    }

    #[test]
    fn resize_keeps_newest_entries() {
        let mut log = UndoLog::with_capacity(5);
        for id in ["a", "b", "c", "d"] {
            log.record(add(id));
        }
        log.resize(2);
        assert_eq!(log.pop(), Some(add("d")));
        assert_eq!(log.pop(), Some(add("c")));
        assert!(log.is_empty());
    }

    #[test]
    fn serializes_with_operation_tag() {
        let json = serde_json::to_value(add("x")).unwrap();
        assert_eq!(json["op"], "addTask");
        assert_eq!(json["id"], "x");
    }
}
