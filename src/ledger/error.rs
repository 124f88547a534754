use thiserror::Error;

use super::models::TaskStatus;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Task not found: {0}")]
    UnknownTask(String),

    #[error("Task {task_id} is already {status} and cannot change")]
    TerminalTask { task_id: String, status: TaskStatus },

    #[error("Task {task_id} cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
