use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::containers::PreprocessObject;
use crate::sources::SourceDescriptor;

/// Lifecycle of a task: `Queued -> Dispatched -> {Completed, Failed}`.
///
/// `Abandoned` is reached from either non-terminal state when an abort stops
/// the task from running to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Dispatched,
    Completed,
    Failed,
    Abandoned,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Abandoned)
    }

    /// Whether the state machine allows moving to `next`
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Queued, TaskStatus::Dispatched)
                | (TaskStatus::Queued, TaskStatus::Abandoned)
                | (TaskStatus::Dispatched, TaskStatus::Completed)
                | (TaskStatus::Dispatched, TaskStatus::Failed)
                | (TaskStatus::Dispatched, TaskStatus::Abandoned)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Dispatched => "dispatched",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Abandoned => "abandoned",
        };
        write!(f, "{}", name)
    }
}

/// One unit of extraction work, bound to exactly one source.
///
/// Tasks are immutable once created; their state lives in the
/// [`TaskManager`](crate::multi_processing::task_manager::TaskManager).
#[derive(Debug, Clone)]
pub struct Task {
    pub identifier: Uuid,
    pub session_identifier: Uuid,
    pub source: SourceDescriptor,
    pub parser_filter_expression: Option<String>,
    pub preprocess: Arc<PreprocessObject>,
    pub creation_time: DateTime<Utc>,
}

impl Task {
    pub fn new(
        session_identifier: Uuid,
        source: SourceDescriptor,
        parser_filter_expression: Option<String>,
        preprocess: Arc<PreprocessObject>,
    ) -> Self {
        Self {
            identifier: Uuid::new_v4(),
            session_identifier,
            source,
            parser_filter_expression,
            preprocess,
            creation_time: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_transitions() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Dispatched));
        assert!(TaskStatus::Dispatched.can_transition_to(TaskStatus::Failed));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Abandoned));

        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Abandoned.can_transition_to(TaskStatus::Dispatched));
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<TaskStatus> = [
            TaskStatus::Queued,
            TaskStatus::Dispatched,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Abandoned,
        ]
        .into_iter()
        .filter(TaskStatus::is_terminal)
        .collect();
        assert_eq!(terminal, vec![TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Abandoned]);
    }
}
