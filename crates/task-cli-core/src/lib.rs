//! Core library for task-cli: task records, the JSON file store, and the operations
//! the command line dispatches to.

pub mod command;
pub mod config;
pub mod store;
pub mod task;
pub mod task_ops;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
