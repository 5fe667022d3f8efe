use std::fmt;

use thiserror::Error;

use crate::storage::StorageError;

/// Which collection an id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    CheckIn,
    Task,
    Any,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::CheckIn => f.write_str("check-in"),
            ItemKind::Task => f.write_str("task"),
            ItemKind::Any => f.write_str("item"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("red threshold ({red} days) must be greater than or equal to the yellow threshold ({yellow} days)")]
    ThresholdOrder { yellow: u32, red: u32 },
    #[error("frequency must be at least 1")]
    ZeroFrequency,
    #[error("completed date must be set exactly when the task is completed")]
    CompletionMismatch,
    #[error("an item with id `{0}` already exists")]
    DuplicateId(String),
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{kind} `{id}` not found")]
    NotFound { kind: ItemKind, id: String },
    #[error("task `{0}` is already completed")]
    AlreadyCompleted(String),
    #[error("failed to persist `{key}`: {source}")]
    Persistence {
        key: String,
        #[source]
        source: StorageError,
    },
    #[error("failed to parse {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("date arithmetic out of range")]
    DateOutOfRange,
}

impl TrackerError {
    pub(crate) fn not_found(kind: ItemKind, id: &str) -> Self {
        TrackerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn parse(context: impl Into<String>, source: serde_json::Error) -> Self {
        TrackerError::Parse {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
