use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::{
    error::{ItemKind, Result, TrackerError, ValidationError},
    interval,
    model::{CheckIn, Task},
    snapshot::{self, ExportSnapshot},
    storage::{KeyValueStorage, MemoryStorage},
    undo::{UndoEntry, UndoLog, DEFAULT_UNDO_CAPACITY},
    view::{self, ViewFilters},
};

pub const CHECK_INS_STORAGE_KEY: &str = "checkin-items";
pub const TASKS_STORAGE_KEY: &str = "task-items";
pub const UNDO_STORAGE_KEY: &str = "checkin-undo-log";

/// Result of a mutation that was applied in memory. The write that follows may
/// still fail; that failure is carried here instead of undoing the change.
#[must_use]
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub persist_error: Option<TrackerError>,
}

impl<T> Mutation<T> {
    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }

    /// Turns a failed write into an error, dropping the value.
    pub fn into_persisted(self) -> Result<T> {
        match self.persist_error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovedItem {
    CheckIn(CheckIn),
    Task(Task),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub check_ins: Option<usize>,
    pub tasks: Option<usize>,
    pub skipped: Vec<String>,
}

pub struct ItemStore {
    storage: Box<dyn KeyValueStorage>,
    check_ins: Vec<CheckIn>,
    tasks: Vec<Task>,
    undo: UndoLog,
    persist_history: bool,
}

pub struct ItemStoreBuilder {
    storage: Option<Box<dyn KeyValueStorage>>,
    undo_capacity: usize,
    persist_history: bool,
}

impl Default for ItemStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStoreBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            undo_capacity: DEFAULT_UNDO_CAPACITY,
            persist_history: false,
        }
    }

    pub fn with_storage(mut self, storage: Box<dyn KeyValueStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn undo_capacity(mut self, capacity: usize) -> Self {
        self.undo_capacity = capacity;
        self
    }

    /// Keep the undo log in storage too, so it survives a restart.
    pub fn persist_history(mut self, enabled: bool) -> Self {
        self.persist_history = enabled;
        self
    }

    /// Builds the store and loads persisted state. Slots that could not be read
    /// come back as recoverable errors; the store starts empty for them.
    pub fn build(self) -> (ItemStore, Vec<TrackerError>) {
        let mut store = ItemStore {
            storage: self
                .storage
                .unwrap_or_else(|| Box::new(MemoryStorage::new())),
            check_ins: Vec::new(),
            tasks: Vec::new(),
            undo: UndoLog::with_capacity(self.undo_capacity),
            persist_history: self.persist_history,
        };
        let errors = store.load();
        (store, errors)
    }
}

impl ItemStore {
    pub fn builder() -> ItemStoreBuilder {
        ItemStoreBuilder::new()
    }

    pub fn check_ins(&self) -> &[CheckIn] {
        &self.check_ins
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get_check_in(&self, id: &str) -> Option<&CheckIn> {
        self.check_ins.iter().find(|item| item.id == id)
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|item| item.id == id)
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    #[instrument(skip(self, record), fields(title = %record.title))]
    pub fn add_check_in(&mut self, mut record: CheckIn) -> Result<Mutation<String>> {
        record.normalize();
        record.validate()?;
        self.ensure_unique_id(&record.id)?;

        let id = record.id.clone();
        self.check_ins.insert(0, record);
        self.undo.record(UndoEntry::AddCheckIn { id: id.clone() });
        tracing::debug!(%id, "check-in added");
        Ok(self.commit(id))
    }

    #[instrument(skip(self, record), fields(title = %record.title))]
    pub fn add_task(&mut self, mut record: Task) -> Result<Mutation<String>> {
        record.normalize();
        record.validate()?;
        self.ensure_unique_id(&record.id)?;

        let id = record.id.clone();
        self.tasks.insert(0, record);
        self.undo.record(UndoEntry::AddTask { id: id.clone() });
        tracing::debug!(%id, "task added");
        Ok(self.commit(id))
    }

    /// Records a check-in at `now` and schedules the next one an interval later.
    #[instrument(skip(self, now))]
    pub fn check_in<Tz: TimeZone>(&mut self, id: &str, now: &DateTime<Tz>) -> Result<Mutation<CheckIn>> {
        let record = self
            .check_ins
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| TrackerError::not_found(ItemKind::CheckIn, id))?;

        let next_due = interval::advance(now, record.frequency_value, record.frequency_unit)
            .ok_or(TrackerError::DateOutOfRange)?
            .with_timezone(&Utc);

        let entry = UndoEntry::CheckIn {
            id: id.to_string(),
            previous_last_check_in_date: record.last_check_in_date,
            previous_next_due_date: record.next_due_date,
        };
        record.last_check_in_date = Some(now.with_timezone(&Utc));
        record.next_due_date = next_due;
        let updated = record.clone();

        self.undo.record(entry);
        tracing::debug!(%id, next_due = %next_due, "checked in");
        Ok(self.commit(updated))
    }

    /// Marks a task done. Completing twice is rejected so the first completion
    /// date is kept.
    #[instrument(skip(self, now))]
    pub fn complete<Tz: TimeZone>(&mut self, id: &str, now: &DateTime<Tz>) -> Result<Mutation<Task>> {
        let record = self
            .tasks
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| TrackerError::not_found(ItemKind::Task, id))?;
        if record.completed {
            return Err(TrackerError::AlreadyCompleted(id.to_string()));
        }

        let entry = UndoEntry::CompleteTask {
            id: id.to_string(),
            previous_completed: record.completed,
            previous_completed_date: record.completed_date,
        };
        record.completed = true;
        record.completed_date = Some(now.with_timezone(&Utc));
        let updated = record.clone();

        self.undo.record(entry);
        tracing::debug!(%id, "task completed");
        Ok(self.commit(updated))
    }

    /// Deletes a check-in or task by id.
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &str) -> Result<Mutation<RemovedItem>> {
        let (entry, removed) = if let Some(index) = self.check_ins.iter().position(|item| item.id == id) {
            let record = self.check_ins.remove(index);
            (
                UndoEntry::RemoveCheckIn {
                    index,
                    record: record.clone(),
                },
                RemovedItem::CheckIn(record),
            )
        } else if let Some(index) = self.tasks.iter().position(|item| item.id == id) {
            let record = self.tasks.remove(index);
            (
                UndoEntry::RemoveTask {
                    index,
                    record: record.clone(),
                },
                RemovedItem::Task(record),
            )
        } else {
            return Err(TrackerError::not_found(ItemKind::Any, id));
        };

        self.undo.record(entry);
        tracing::debug!(%id, "item removed");
        Ok(self.commit(removed))
    }

    /// Reverses the most recent mutation. `None` when there is nothing to undo.
    #[instrument(skip(self))]
    pub fn undo(&mut self) -> Option<Mutation<UndoEntry>> {
        let entry = self.undo.pop()?;
        if !self.reverse(&entry) {
            tracing::warn!(entry = %entry.describe(), "undo target no longer present");
        }
        Some(self.commit(entry))
    }

    pub fn view_check_ins<Tz: TimeZone>(&self, filters: &ViewFilters, now: &DateTime<Tz>) -> Vec<&CheckIn> {
        view::view(&self.check_ins, filters, now)
    }

    pub fn view_tasks<Tz: TimeZone>(&self, filters: &ViewFilters, now: &DateTime<Tz>) -> Vec<&Task> {
        view::view(&self.tasks, filters, now)
    }

    pub fn export_snapshot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> ExportSnapshot {
        ExportSnapshot {
            checkins: self.check_ins.clone(),
            tasks: self.tasks.clone(),
            export_date: now.with_timezone(&Utc),
        }
    }

    /// Replaces each collection the document carries. Malformed JSON aborts the
    /// whole import with nothing changed. Imported records get the same title
    /// and label cleanup as added ones; a repeated id keeps its first record
    /// and the rest are skipped. A successful import clears the undo
    /// log since its entries refer to the replaced records.
    #[instrument(skip(self, raw), fields(bytes = raw.len()))]
    pub fn import_snapshot(&mut self, raw: &str) -> Result<Mutation<ImportSummary>> {
        let payload = snapshot::parse_import(raw)?;
        if payload.is_empty() {
            tracing::warn!("import document carried no collections");
        }
        let mut summary = ImportSummary {
            skipped: payload.skipped,
            ..ImportSummary::default()
        };

        // Ids already claimed by a collection the import leaves in place.
        let mut seen: HashSet<String> = HashSet::new();
        if payload.check_ins.is_none() {
            seen.extend(self.check_ins.iter().map(|item| item.id.clone()));
        }
        if payload.tasks.is_none() {
            seen.extend(self.tasks.iter().map(|item| item.id.clone()));
        }

        let check_ins = payload.check_ins.map(|records| {
            dedupe_imported(records, &mut seen, &mut summary.skipped, |item: &mut CheckIn| {
                item.normalize();
                item.id.clone()
            })
        });
        let tasks = payload.tasks.map(|records| {
            dedupe_imported(records, &mut seen, &mut summary.skipped, |item: &mut Task| {
                item.normalize();
                item.id.clone()
            })
        });

        if let Some(check_ins) = check_ins {
            summary.check_ins = Some(check_ins.len());
            self.check_ins = check_ins;
        }
        if let Some(tasks) = tasks {
            summary.tasks = Some(tasks.len());
            self.tasks = tasks;
        }
        if summary.check_ins.is_some() || summary.tasks.is_some() {
            self.undo.clear();
        }

        tracing::info!(
            check_ins = ?summary.check_ins,
            tasks = ?summary.tasks,
            skipped = summary.skipped.len(),
            "import applied"
        );
        Ok(self.commit(summary))
    }

    /// Replaces the in-memory state with what storage holds. Missing slots
    /// load as empty; unreadable ones load as empty and are reported.
    pub fn load(&mut self) -> Vec<TrackerError> {
        let mut errors = Vec::new();
        self.check_ins = self.read_slot(CHECK_INS_STORAGE_KEY, &mut errors).unwrap_or_default();
        self.tasks = self.read_slot(TASKS_STORAGE_KEY, &mut errors).unwrap_or_default();
        if self.persist_history {
            let capacity = self.undo.capacity();
            let mut restored: UndoLog = self
                .read_slot(UNDO_STORAGE_KEY, &mut errors)
                .unwrap_or_else(|| UndoLog::with_capacity(capacity));
            restored.resize(capacity);
            self.undo = restored;
        } else {
            self.undo.clear();
        }
        tracing::debug!(
            check_ins = self.check_ins.len(),
            tasks = self.tasks.len(),
            failed_slots = errors.len(),
            "store loaded"
        );
        errors
    }

    /// Writes every slot. All slots are attempted; the first failure is returned.
    pub fn persist(&self) -> Result<()> {
        let mut first_error = None;
        let mut write = |key: &str, encoded: std::result::Result<String, serde_json::Error>| {
            let outcome = encoded
                .map_err(|err| TrackerError::parse(format!("slot `{key}`"), err))
                .and_then(|value| {
                    self.storage
                        .set_item(key, &value)
                        .map_err(|source| TrackerError::Persistence {
                            key: key.to_string(),
                            source,
                        })
                });
            if let Err(err) = outcome {
                tracing::error!(%err, "failed to save");
                first_error.get_or_insert(err);
            }
        };

        write(CHECK_INS_STORAGE_KEY, serde_json::to_string(&self.check_ins));
        write(TASKS_STORAGE_KEY, serde_json::to_string(&self.tasks));
        if self.persist_history {
            write(UNDO_STORAGE_KEY, serde_json::to_string(&self.undo));
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ItemStore {
    fn commit<T>(&self, value: T) -> Mutation<T> {
        Mutation {
            value,
            persist_error: self.persist().err(),
        }
    }

    fn ensure_unique_id(&self, id: &str) -> Result<()> {
        if self.get_check_in(id).is_some() || self.get_task(id).is_some() {
            return Err(ValidationError::DuplicateId(id.to_string()).into());
        }
        Ok(())
    }

    fn read_slot<T: DeserializeOwned>(&self, key: &str, errors: &mut Vec<TrackerError>) -> Option<T> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(source) => {
                tracing::warn!(key, %source, "storage slot unavailable");
                errors.push(TrackerError::Persistence {
                    key: key.to_string(),
                    source,
                });
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, %err, "failed to parse stored slot");
                errors.push(TrackerError::parse(format!("slot `{key}`"), err));
                None
            }
        }
    }

    // Returns false when the record the entry refers to is gone.
    fn reverse(&mut self, entry: &UndoEntry) -> bool {
        match entry {
            UndoEntry::AddCheckIn { id } => {
                let before = self.check_ins.len();
                self.check_ins.retain(|item| &item.id != id);
                self.check_ins.len() != before
            }
            UndoEntry::AddTask { id } => {
                let before = self.tasks.len();
                self.tasks.retain(|item| &item.id != id);
                self.tasks.len() != before
            }
            UndoEntry::CheckIn {
                id,
                previous_last_check_in_date,
                previous_next_due_date,
            } => match self.check_ins.iter_mut().find(|item| &item.id == id) {
                Some(record) => {
                    record.last_check_in_date = *previous_last_check_in_date;
                    record.next_due_date = *previous_next_due_date;
                    true
                }
                None => false,
            },
            UndoEntry::CompleteTask {
                id,
                previous_completed,
                previous_completed_date,
            } => match self.tasks.iter_mut().find(|item| &item.id == id) {
                Some(record) => {
                    record.completed = *previous_completed;
                    record.completed_date = *previous_completed_date;
                    true
                }
                None => false,
            },
            UndoEntry::RemoveCheckIn { index, record } => {
                let index = (*index).min(self.check_ins.len());
                self.check_ins.insert(index, record.clone());
                true
            }
            UndoEntry::RemoveTask { index, record } => {
                let index = (*index).min(self.tasks.len());
                self.tasks.insert(index, record.clone());
                true
            }
        }
    }
}

// Normalizes each record and drops any whose id is already in `seen`.
fn dedupe_imported<T>(
    records: Vec<T>,
    seen: &mut HashSet<String>,
    skipped: &mut Vec<String>,
    mut prepare: impl FnMut(&mut T) -> String,
) -> Vec<T> {
    let mut kept = Vec::with_capacity(records.len());
    for mut record in records {
        let id = prepare(&mut record);
        if seen.insert(id.clone()) {
            kept.push(record);
        } else {
            skipped.push(format!("duplicate id `{id}`"));
        }
    }
    kept
}
