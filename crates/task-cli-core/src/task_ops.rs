use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;

use crate::store::{LockMode, StoreError, TaskStore};
use crate::task::{format_timestamp, Status, Task};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Unknown command: {0}")]
    UnknownCommand(String),
    #[error("Task not found: {0}")]
    NotFound(u64),
    #[error("Task id space exhausted: highest id is {0}")]
    IdsExhausted(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TaskError {
    pub fn exit_code(&self) -> u8 {
        match self {
            TaskError::InvalidArguments(_) => 1,
            TaskError::UnknownCommand(_) => 2,
            TaskError::NotFound(_) => 3,
            TaskError::IdsExhausted(_) | TaskError::Store(_) => 4,
        }
    }
}

pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Next id to hand out: one past the highest id present.
pub fn next_id(tasks: &[Task]) -> Result<u64, TaskError> {
    let highest = tasks.iter().map(|task| task.id).max().unwrap_or(0);
    highest
        .checked_add(1)
        .ok_or(TaskError::IdsExhausted(highest))
}

pub fn filter_tasks(tasks: &[Task], status: Option<Status>) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| status.map_or(true, |status| task.status == status))
        .collect()
}

pub fn render_task_line(task: &Task) -> String {
    let description = if task.description.trim().is_empty() {
        "(no description)"
    } else {
        task.description.trim()
    };
    let modified = task
        .modified_at
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | {} | {} | {} | {}",
        task.id,
        task.status,
        format_timestamp(&task.created_at),
        modified,
        description
    )
}

fn require_description(description: &str) -> Result<&str, TaskError> {
    if description.trim().is_empty() {
        return Err(TaskError::InvalidArguments(
            "description must not be empty".to_string(),
        ));
    }
    Ok(description)
}

fn find_mut(tasks: &mut [Task], id: u64) -> Result<&mut Task, TaskError> {
    tasks
        .iter_mut()
        .find(|task| task.id == id)
        .ok_or(TaskError::NotFound(id))
}

/// Runs one read-modify-write cycle under the exclusive store lock. Nothing is written
/// when `apply` fails.
fn mutate<T>(
    store: &TaskStore,
    apply: impl FnOnce(&mut Vec<Task>) -> Result<T, TaskError>,
) -> Result<T, TaskError> {
    let _lock = store.lock(LockMode::Exclusive)?;
    let mut tasks = store.load_all()?;
    let result = apply(&mut tasks)?;
    store.save_all(&tasks)?;
    Ok(result)
}

pub fn add_task(store: &TaskStore, description: &str) -> Result<Task, TaskError> {
    let description = require_description(description)?;
    let task = mutate(store, |tasks| {
        let task = Task::new(next_id(tasks)?, description, now());
        tasks.push(task.clone());
        Ok(task)
    })?;
    info!(id = task.id, "added task");
    Ok(task)
}

pub fn update_task(store: &TaskStore, id: u64, description: &str) -> Result<Task, TaskError> {
    let description = require_description(description)?;
    let task = mutate(store, |tasks| {
        let task = find_mut(tasks, id)?;
        task.description = description.to_string();
        task.touch(now());
        Ok(task.clone())
    })?;
    info!(id, "updated task");
    Ok(task)
}

pub fn delete_task(store: &TaskStore, id: u64) -> Result<Task, TaskError> {
    let task = mutate(store, |tasks| {
        let index = tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(TaskError::NotFound(id))?;
        Ok(tasks.remove(index))
    })?;
    info!(id, "deleted task");
    Ok(task)
}

pub fn set_status(store: &TaskStore, id: u64, status: Status) -> Result<Task, TaskError> {
    let task = mutate(store, |tasks| {
        let task = find_mut(tasks, id)?;
        task.status = status;
        task.touch(now());
        Ok(task.clone())
    })?;
    info!(id, %status, "changed task status");
    Ok(task)
}

/// Readers share the lock unless the load is going to initialize a missing file.
fn read_lock_mode(store: &TaskStore) -> LockMode {
    if store.path().exists() {
        LockMode::Shared
    } else {
        LockMode::Exclusive
    }
}

/// Reads the store without writing it back. A missing file is still initialized.
pub fn list_tasks(store: &TaskStore, status: Option<Status>) -> Result<Vec<Task>, TaskError> {
    let _lock = store.lock(read_lock_mode(store))?;
    let tasks = store.load_all()?;
    Ok(filter_tasks(&tasks, status).into_iter().cloned().collect())
}
