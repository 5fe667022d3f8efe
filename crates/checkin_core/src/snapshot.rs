use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TrackerError};
use crate::model::{CheckIn, Task};

pub const CHECK_INS_FIELD: &str = "checkins";
pub const TASKS_FIELD: &str = "tasks";

/// Export document: both collections plus the moment they were captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub checkins: Vec<CheckIn>,
    pub tasks: Vec<Task>,
    pub export_date: DateTime<Utc>,
}

impl ExportSnapshot {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| TrackerError::parse("export snapshot", err))
    }
}

/// The usable parts of an import document. A collection is `None` when the
/// document does not carry a well-formed array for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportPayload {
    pub check_ins: Option<Vec<CheckIn>>,
    pub tasks: Option<Vec<Task>>,
    /// Fields that were present but could not be read, with the reason.
    pub skipped: Vec<String>,
}

impl ImportPayload {
    pub fn is_empty(&self) -> bool {
        self.check_ins.is_none() && self.tasks.is_none()
    }
}

/// Reads an import document. Only malformed JSON is an error; a missing or
/// unreadable collection is left out of the payload.
pub fn parse_import(raw: &str) -> Result<ImportPayload> {
    let document: Value =
        serde_json::from_str(raw).map_err(|err| TrackerError::parse("import document", err))?;

    let mut payload = ImportPayload::default();
    let Value::Object(mut fields) = document else {
        payload.skipped.push("document is not an object".to_string());
        return Ok(payload);
    };

    payload.check_ins = take_array(&mut fields, CHECK_INS_FIELD, &mut payload.skipped);
    payload.tasks = take_array(&mut fields, TASKS_FIELD, &mut payload.skipped);
    Ok(payload)
}

fn take_array<T: serde::de::DeserializeOwned>(
    fields: &mut serde_json::Map<String, Value>,
    name: &str,
    skipped: &mut Vec<String>,
) -> Option<Vec<T>> {
    match fields.remove(name)? {
        value @ Value::Array(_) => match serde_json::from_value(value) {
            Ok(records) => Some(records),
            Err(err) => {
                tracing::warn!(field = name, %err, "ignoring malformed collection in import");
                skipped.push(format!("{name}: {err}"));
                None
            }
        },
        Value::Null => None,
        _ => {
            skipped.push(format!("{name}: not an array"));
            None
        }
    }
}
