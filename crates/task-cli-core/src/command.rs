use std::fmt;

use crate::store::TaskStore;
use crate::task::{Status, Task};
use crate::task_ops::{
    add_task, delete_task, list_tasks, render_task_line, set_status, update_task, TaskError,
};

pub const MARK_PREFIX: &str = "mark";

/// One decoded invocation. Each variant carries already-validated arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { description: String },
    Update { id: u64, description: String },
    Delete { id: u64 },
    SetStatus { status: Status, id: u64 },
    List { status: Option<Status> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Added(Task),
    Updated(Task),
    Deleted(Task),
    StatusChanged(Task),
    Listed(Vec<Task>),
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Added(task) => write!(f, "Task added successfully (ID: {})", task.id),
            Report::Updated(task) => write!(f, "Task {} updated successfully", task.id),
            Report::Deleted(task) => write!(f, "Task {} deleted successfully", task.id),
            Report::StatusChanged(task) => {
                write!(f, "Task {} marked as {}", task.id, task.status)
            }
            Report::Listed(tasks) if tasks.is_empty() => f.write_str("No tasks found"),
            Report::Listed(tasks) => {
                let lines: Vec<String> = tasks.iter().map(render_task_line).collect();
                f.write_str(&lines.join("\n"))
            }
        }
    }
}

pub fn parse_id(raw: &str) -> Result<u64, TaskError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| TaskError::InvalidArguments(format!("'{}' is not a valid task id", raw)))
}

/// Extracts the status from a `mark-<status>` command word: every segment after the
/// first, rejoined with `-`.
pub fn status_from_command(word: &str) -> Result<Status, TaskError> {
    let mut segments = word.split('-');
    if segments.next() != Some(MARK_PREFIX) {
        return Err(TaskError::UnknownCommand(word.to_string()));
    }
    let token = segments.collect::<Vec<_>>().join("-");
    token
        .parse::<Status>()
        .map_err(|err| TaskError::InvalidArguments(err.to_string()))
}

/// Decodes a `mark-<status> <id>` invocation.
pub fn decode_mark(word: &str, args: &[String]) -> Result<Command, TaskError> {
    let status = status_from_command(word)?;
    match args {
        [id] => Ok(Command::SetStatus {
            status,
            id: parse_id(id)?,
        }),
        _ => Err(TaskError::InvalidArguments(format!(
            "usage: {} <id>",
            word
        ))),
    }
}

pub fn execute(store: &TaskStore, command: Command) -> Result<Report, TaskError> {
    match command {
        Command::Add { description } => add_task(store, &description).map(Report::Added),
        Command::Update { id, description } => {
            update_task(store, id, &description).map(Report::Updated)
        }
        Command::Delete { id } => delete_task(store, id).map(Report::Deleted),
        Command::SetStatus { status, id } => {
            set_status(store, id, status).map(Report::StatusChanged)
        }
        Command::List { status } => list_tasks(store, status).map(Report::Listed),
    }
}
