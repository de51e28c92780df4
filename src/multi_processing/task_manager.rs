use std::collections::HashMap;

use log::debug;
use thiserror::Error;
use uuid::Uuid;

use crate::multi_processing::task::{Task, TaskStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskStateError {
    #[error("unknown task {0}")]
    UnknownTask(Uuid),

    #[error("task {task} cannot move from {from} to {to}")]
    InvalidTransition { task: Uuid, from: TaskStatus, to: TaskStatus },
}

#[derive(Debug)]
struct TaskRecord {
    source: String,
    status: TaskStatus,
}

/// Tracks the state of every task of a processing run.
///
/// The number of tasks in `queued ∪ dispatched` is maintained on every
/// transition so the bound on outstanding work can be observed.
#[derive(Debug, Default)]
pub struct TaskManager {
    tasks: HashMap<Uuid, TaskRecord>,
    outstanding: usize,
    peak_outstanding: usize,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly scheduled task as queued
    pub fn create_task(&mut self, task: &Task) {
        self.tasks.insert(
            task.identifier,
            TaskRecord {
                source: task.source.to_string(),
                status: TaskStatus::Queued,
            },
        );
        self.outstanding += 1;
        self.peak_outstanding = self.peak_outstanding.max(self.outstanding);
        debug!("Task {} queued for {}", task.identifier, task.source);
    }

    /// Move a task to `status`, rejecting transitions the lifecycle forbids
    pub fn update_task(&mut self, identifier: Uuid, status: TaskStatus) -> Result<(), TaskStateError> {
        let record = self
            .tasks
            .get_mut(&identifier)
            .ok_or(TaskStateError::UnknownTask(identifier))?;

        if !record.status.can_transition_to(status) {
            return Err(TaskStateError::InvalidTransition {
                task: identifier,
                from: record.status,
                to: status,
            });
        }

        record.status = status;
        if status.is_terminal() {
            self.outstanding -= 1;
        }
        Ok(())
    }

    pub fn status(&self, identifier: Uuid) -> Option<TaskStatus> {
        self.tasks.get(&identifier).map(|r| r.status)
    }

    pub fn source(&self, identifier: Uuid) -> Option<&str> {
        self.tasks.get(&identifier).map(|r| r.source.as_str())
    }

    pub fn number_of_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks currently queued or dispatched
    pub fn number_of_outstanding_tasks(&self) -> usize {
        self.outstanding
    }

    pub fn peak_outstanding_tasks(&self) -> usize {
        self.peak_outstanding
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|r| r.status == status).count()
    }

    pub fn all_terminal(&self) -> bool {
        self.outstanding == 0
    }

    /// Abandon every task that has not reached a terminal state
    pub fn abandon_outstanding(&mut self) -> Vec<Uuid> {
        let outstanding: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|(_, r)| !r.status.is_terminal())
            .map(|(id, _)| *id)
            .collect();

        for identifier in &outstanding {
            if let Some(record) = self.tasks.get_mut(identifier) {
                record.status = TaskStatus::Abandoned;
            }
        }
        self.outstanding -= outstanding.len();
        outstanding
    }
}
