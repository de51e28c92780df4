use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Completed,
    /// Stopped by an abort signal before every task ran
    Aborted,
    /// A setup or storage error ended the run
    Failed,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Aborted => "aborted",
            SessionStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Running statistics of an extraction session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub containers_by_type: BTreeMap<String, u64>,
    pub events: u64,
    /// Failed tasks
    pub errors: u64,
    /// Containers the store refused; not counted in `errors`
    pub rejected_containers: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_abandoned: u64,
    pub preprocess_warnings: u64,
    pub parsers_used: BTreeMap<String, u64>,
}

/// One end-to-end extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identifier: Uuid,
    pub start_time: DateTime<Utc>,
    pub completion_time: Option<DateTime<Utc>>,
    pub label: Option<String>,
    pub status: SessionStatus,
    pub analysis_hostname: Option<String>,
    pub parser_filter_expression: Option<String>,
    pub counters: SessionCounters,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            identifier: Uuid::new_v4(),
            start_time: Utc::now(),
            completion_time: None,
            label: None,
            status: SessionStatus::Running,
            analysis_hostname: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
            parser_filter_expression: None,
            counters: SessionCounters::default(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.completion_time.is_some()
    }

    fn counters_mut(&mut self) -> Option<&mut SessionCounters> {
        if self.is_finalized() {
            debug!("Ignoring counter update on finalized session {}", self.identifier);
            return None;
        }
        Some(&mut self.counters)
    }

    /// Count a persisted container
    pub fn record_container(&mut self, container_type: &str, timeline_event: bool) {
        if let Some(counters) = self.counters_mut() {
            *counters.containers_by_type.entry(container_type.to_string()).or_insert(0) += 1;
            if timeline_event {
                counters.events += 1;
            }
        }
    }

    /// Count a container the store refused
    pub fn record_rejected_container(&mut self) {
        if let Some(counters) = self.counters_mut() {
            counters.rejected_containers += 1;
        }
    }

    pub fn record_task_completed(&mut self, parsers: &[String]) {
        if let Some(counters) = self.counters_mut() {
            counters.tasks_completed += 1;
            for parser in parsers {
                *counters.parsers_used.entry(parser.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn record_task_failed(&mut self, parsers: &[String]) {
        if let Some(counters) = self.counters_mut() {
            counters.tasks_failed += 1;
            counters.errors += 1;
            for parser in parsers {
                *counters.parsers_used.entry(parser.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn record_task_abandoned(&mut self) {
        if let Some(counters) = self.counters_mut() {
            counters.tasks_abandoned += 1;
        }
    }

    pub fn record_preprocess_warnings(&mut self, count: u64) {
        if let Some(counters) = self.counters_mut() {
            counters.preprocess_warnings += count;
        }
    }

    /// Set the final status and completion time; counters are frozen afterwards
    pub fn finalize(&mut self, status: SessionStatus) {
        if self.is_finalized() {
            return;
        }
        self.status = status;
        self.completion_time = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut session = Session::new();
        session.record_container("fs:stat", true);
        session.record_container("fs:stat", true);
        session.record_container("preprocess", false);
        session.record_task_completed(&["filestat".to_string()]);
        session.record_task_failed(&["macwifi".to_string()]);
        session.record_rejected_container();

        assert_eq!(session.counters.events, 2);
        assert_eq!(session.counters.containers_by_type["fs:stat"], 2);
        assert_eq!(session.counters.containers_by_type["preprocess"], 1);
        assert_eq!(session.counters.tasks_failed, 1);
        assert_eq!(session.counters.rejected_containers, 1);
        assert_eq!(session.counters.errors, 1);
        assert_eq!(session.counters.parsers_used.len(), 2);
    }

    #[test]
    fn test_finalize_freezes_counters() {
        let mut session = Session::new().with_label("case 42");
        session.record_container("event", true);
        session.finalize(SessionStatus::Completed);

        session.record_container("event", true);
        session.record_task_failed(&[]);
        session.finalize(SessionStatus::Failed);

        assert_eq!(session.counters.events, 1);
        assert_eq!(session.counters.errors, 0);
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completion_time.is_some());
        assert_eq!(session.label.as_deref(), Some("case 42"));
    }

    #[test]
    fn test_session_serialization() {
        let mut session = Session::new();
        session.record_container("event", true);
        let json = serde_json::to_string(&session).unwrap();
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
        assert!(json.contains("\"status\":\"running\""));
    }
}
