//! Wire types for the import endpoints and the progress channel.
//!
//! The progress channel pushes one of three payloads per server-sent
//! event:
//!
//! - `{"sseid": "<id>"}` announcing the channel's session id,
//! - a human-readable progress string (bare or JSON-quoted),
//! - `end`, after which the server closes the stream.

use kiss_core::commit_flow::RoutingSource;
use kiss_core::filters::{FilterField, FilterLists};
use kiss_core::preferences::{DiscardType, FileHeader, ImportPreferences};
use kiss_core::staged_part::StagedPart;
use kiss_core::types::{JobId, Timestamp};
use serde::{Deserialize, Serialize};

/// Terminal payload on the progress channel.
pub const PROGRESS_END: &str = "end";

// ---------------------------------------------------------------------------
// Progress channel
// ---------------------------------------------------------------------------

/// One message received on the progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressMessage {
    /// The channel's session id, echoed back in the commit request.
    Session { sseid: String },
    /// Free-text status of the running import.
    Progress(String),
    /// The server finished reporting.
    End,
}

/// Interpret the `data` of one server-sent event.
///
/// Never fails: anything that is not a session announcement or the end
/// marker is shown to the operator as progress text.
pub fn parse_message(data: &str) -> ProgressMessage {
    let trimmed = data.trim();
    if trimmed == PROGRESS_END {
        return ProgressMessage::End;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("sseid") {
            Some(serde_json::Value::String(id)) => ProgressMessage::Session { sseid: id.clone() },
            Some(serde_json::Value::Number(id)) => ProgressMessage::Session {
                sseid: id.to_string(),
            },
            _ => ProgressMessage::Progress(trimmed.to_string()),
        },
        Ok(serde_json::Value::String(text)) if text == PROGRESS_END => ProgressMessage::End,
        Ok(serde_json::Value::String(text)) => ProgressMessage::Progress(text),
        _ => ProgressMessage::Progress(trimmed.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Import endpoints
// ---------------------------------------------------------------------------

/// Staged rows and settings for one job, as loaded from the server.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StagedImport {
    #[serde(rename = "Parts", default)]
    pub parts: Vec<StagedPart>,
    #[serde(rename = "FileHeader", default)]
    pub file_header: FileHeader,
    #[serde(rename = "ImportPreferences", default)]
    pub preferences: ImportPreferences,
    #[serde(rename = "DiscardTypes", default)]
    pub discard_types: Vec<DiscardType>,
}

/// Body of the commit request.
#[derive(Debug, Clone, Serialize)]
pub struct CommitRequest {
    #[serde(rename = "JobID")]
    pub job_id: JobId,
    #[serde(rename = "Parts")]
    pub parts: Vec<StagedPart>,
    #[serde(rename = "ImportPreferences")]
    pub preferences: ImportPreferences,
    #[serde(rename = "Filters")]
    pub filters: FilterLists,
    #[serde(rename = "RoutingSource")]
    pub routing: RoutingSource,
    /// Progress channel session id; absent if the channel never opened.
    #[serde(rename = "SSEID")]
    pub sseid: Option<String>,
}

/// Successful commit response.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitResponse {
    /// Filter fields the server could not apply.
    #[serde(rename = "BadFilters", default)]
    pub bad_filters: Option<Vec<String>>,
    /// Destination records no longer in the file should be reviewed for
    /// deletion.
    #[serde(rename = "NeedToDeleteRecords", default)]
    pub need_to_delete_records: Option<bool>,
    #[serde(rename = "ImportStartTime")]
    pub import_start_time: Timestamp,
    #[serde(rename = "ImportPreferences", default)]
    pub preferences: Option<ImportPreferences>,
}

impl CommitResponse {
    /// The recognised bad filter fields.
    pub fn bad_filter_fields(&self) -> Vec<FilterField> {
        self.bad_filters
            .iter()
            .flatten()
            .filter_map(|name| FilterField::from_name(name))
            .collect()
    }

    pub fn needs_deletion_review(&self) -> bool {
        self.need_to_delete_records.unwrap_or(false)
    }
}

/// Handle of a generated deletion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeletionReport {
    #[serde(rename = "ID")]
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeletionReportRequest<'a> {
    #[serde(rename = "ImportStartTime")]
    pub import_start_time: &'a Timestamp,
}
