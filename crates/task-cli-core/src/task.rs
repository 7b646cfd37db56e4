use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    ToDo,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::ToDo, Status::InProgress, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::ToDo => "to-do",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown status '{0}' (expected to-do, in-progress or done)")]
pub struct ParseStatusError(pub String);

impl FromStr for Status {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| ParseStatusError(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub description: String,
    pub status: Status,
    pub created_at: DateTime<Local>,
    pub modified_at: Option<DateTime<Local>>,
}

impl Task {
    pub fn new(id: u64, description: impl Into<String>, now: DateTime<Local>) -> Self {
        Self {
            id,
            description: description.into(),
            status: Status::ToDo,
            created_at: now,
            modified_at: None,
        }
    }

    /// Records a mutation at `now`. The stored value never moves backwards, even if the
    /// clock does.
    pub fn touch(&mut self, now: DateTime<Local>) {
        let floor = self.modified_at.unwrap_or(self.created_at);
        self.modified_at = Some(now.max(floor));
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("store is not a JSON array of tasks: {0}")]
    Document(#[source] serde_json::Error),
    #[error("record {index}: {reason}")]
    Record { index: usize, reason: String },
    #[error("failed to serialize tasks: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// On-disk shape of a task. Field names are camelCase to stay readable by the tools
/// that already write `tasks.json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: u64,
    description: String,
    status: String,
    created_at: String,
    #[serde(default)]
    modified_at: Option<String>,
}

impl From<&Task> for TaskRecord {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            created_at: format_timestamp(&task.created_at),
            modified_at: task.modified_at.as_ref().map(format_timestamp),
        }
    }
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        if record.id == 0 {
            return Err("id must be a positive integer".to_string());
        }
        let status = record
            .status
            .parse::<Status>()
            .map_err(|err| err.to_string())?;
        let created_at = parse_timestamp(&record.created_at)
            .ok_or_else(|| format!("createdAt is not an ISO-8601 timestamp: {}", record.created_at))?;
        let modified_at = match record.modified_at.as_deref() {
            None => None,
            Some(value) => Some(
                parse_timestamp(value)
                    .ok_or_else(|| format!("modifiedAt is not an ISO-8601 timestamp: {}", value))?,
            ),
        };
        Ok(Task {
            id: record.id,
            description: record.description,
            status,
            created_at,
            modified_at,
        })
    }
}

pub fn format_timestamp(value: &DateTime<Local>) -> String {
    value.to_rfc3339()
}

/// Accepts RFC 3339 and offset-less ISO-8601 datetimes. The latter are read as local
/// time.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Local));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}

pub fn parse_tasks(text: &str) -> Result<Vec<Task>, CodecError> {
    let values: Vec<Value> = serde_json::from_str(text).map_err(CodecError::Document)?;
    let mut seen = HashSet::new();
    let mut tasks = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let record: TaskRecord = serde_json::from_value(value).map_err(|err| CodecError::Record {
            index,
            reason: err.to_string(),
        })?;
        let task = Task::try_from(record).map_err(|reason| CodecError::Record { index, reason })?;
        if !seen.insert(task.id) {
            return Err(CodecError::Record {
                index,
                reason: format!("duplicate id {}", task.id),
            });
        }
        tasks.push(task);
    }
    Ok(tasks)
}

pub fn render_tasks(tasks: &[Task]) -> Result<String, CodecError> {
    let records: Vec<TaskRecord> = tasks.iter().map(TaskRecord::from).collect();
    let mut text = serde_json::to_string_pretty(&records).map_err(CodecError::Serialize)?;
    text.push('\n');
    Ok(text)
}

/// JSON view of a single task, in the same shape as the store file.
pub fn task_to_json(task: &Task) -> Value {
    serde_json::to_value(TaskRecord::from(task)).unwrap_or(Value::Null)
}
