use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::constants::{ABORT_POLL_INTERVAL_MS, PROGRESS_REPORT_INTERVAL};
use crate::containers::{AttributeContainer, ContainerRegistry, Session};
use crate::multi_processing::abort::AbortSignal;
use crate::multi_processing::task::TaskStatus;
use crate::multi_processing::task_manager::TaskManager;
use crate::multi_processing::worker::WorkerMessage;
use crate::storage::{StorageWriter, StoreError};

/// Outcome of a collection run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectorStatus {
    pub containers_written: u64,
    pub containers_rejected: u64,
    pub tasks_abandoned: usize,
    /// Workers were still busy when the abort grace period ran out
    pub forced_termination: bool,
}

/// Single consumer of worker output and the only caller of
/// [`StorageWriter::add_container`] during a run.
pub struct Collector<'a> {
    writer: &'a mut dyn StorageWriter,
    session: &'a mut Session,
    registry: &'a ContainerRegistry,
    task_manager: Arc<Mutex<TaskManager>>,
    slots: Sender<()>,
    abort: AbortSignal,
    abort_grace_timeout: Duration,
    status: CollectorStatus,
}

impl<'a> Collector<'a> {
    pub fn new(
        writer: &'a mut dyn StorageWriter,
        session: &'a mut Session,
        registry: &'a ContainerRegistry,
        task_manager: Arc<Mutex<TaskManager>>,
        slots: Sender<()>,
        abort: AbortSignal,
        abort_grace_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            session,
            registry,
            task_manager,
            slots,
            abort,
            abort_grace_timeout,
            status: CollectorStatus::default(),
        }
    }

    fn task_manager(&self) -> MutexGuard<'_, TaskManager> {
        self.task_manager.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drain worker output until every sender is gone.
    ///
    /// After an abort, draining continues until the grace timeout; tasks that
    /// are still outstanding then are abandoned. A storage failure aborts the
    /// run and is returned.
    pub fn run(mut self, results: Receiver<WorkerMessage>) -> Result<CollectorStatus, StoreError> {
        let poll_interval = Duration::from_millis(ABORT_POLL_INTERVAL_MS);

        loop {
            if self.grace_period_expired() {
                warn!(
                    "Abort grace period of {:?} expired with {} tasks outstanding",
                    self.abort_grace_timeout,
                    self.task_manager().number_of_outstanding_tasks()
                );
                self.status.forced_termination = true;
                break;
            }

            match results.recv_timeout(poll_interval) {
                Ok(message) => {
                    if let Err(e) = self.handle(message) {
                        self.abort.abort();
                        return Err(e);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let abandoned = self.task_manager().abandon_outstanding();
        if !abandoned.is_empty() {
            if !self.abort.is_aborted() {
                warn!("{} tasks ended without reporting a result", abandoned.len());
            }
            for _ in &abandoned {
                self.session.record_task_abandoned();
            }
            self.status.tasks_abandoned += abandoned.len();
        }

        debug!(
            "Collector finished: {} containers written, {} rejected",
            self.status.containers_written, self.status.containers_rejected
        );
        Ok(self.status)
    }

    fn grace_period_expired(&self) -> bool {
        self.abort
            .time_since_abort()
            .map(|elapsed| elapsed >= self.abort_grace_timeout)
            .unwrap_or(false)
    }

    fn handle(&mut self, message: WorkerMessage) -> Result<(), StoreError> {
        match message {
            WorkerMessage::Container {
                task_identifier,
                session_identifier,
                container,
            } => self.write_container(task_identifier, session_identifier, &container),
            WorkerMessage::Completed {
                task_identifier,
                parsers,
                number_of_containers,
            } => {
                if self.finish_task(task_identifier, TaskStatus::Completed) {
                    debug!("Task {} completed with {} containers", task_identifier, number_of_containers);
                    self.session.record_task_completed(&parsers);
                }
                Ok(())
            }
            WorkerMessage::Failed {
                task_identifier,
                parsers,
                parser,
                error,
            } => {
                if self.finish_task(task_identifier, TaskStatus::Failed) {
                    debug!(
                        "Task {} failed in {}: {}",
                        task_identifier,
                        parser.as_deref().unwrap_or("source resolution"),
                        error
                    );
                    self.session.record_task_failed(&parsers);
                }
                Ok(())
            }
            WorkerMessage::Abandoned { task_identifier } => {
                if self.finish_task(task_identifier, TaskStatus::Abandoned) {
                    self.session.record_task_abandoned();
                    self.status.tasks_abandoned += 1;
                }
                Ok(())
            }
        }
    }

    fn write_container(
        &mut self,
        task_identifier: Uuid,
        session_identifier: Uuid,
        container: &AttributeContainer,
    ) -> Result<(), StoreError> {
        if session_identifier != self.session.identifier {
            warn!(
                "Rejecting {} container of task {} from foreign session {}",
                container.container_type(),
                task_identifier,
                session_identifier
            );
            self.reject();
            return Ok(());
        }

        match self.writer.add_container(container) {
            Ok(()) => {
                let timeline_event = self
                    .registry
                    .lookup(container.container_type())
                    .map(|schema| schema.is_timeline_event())
                    .unwrap_or(false);
                self.session.record_container(container.container_type(), timeline_event);
                self.status.containers_written += 1;
                if self.status.containers_written % PROGRESS_REPORT_INTERVAL == 0 {
                    info!("{} containers written", self.status.containers_written);
                }
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                warn!("Rejected container from task {}: {}", task_identifier, e);
                self.reject();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn reject(&mut self) {
        self.session.record_rejected_container();
        self.status.containers_rejected += 1;
    }

    /// Record a terminal transition and free the task's slot
    fn finish_task(&mut self, task_identifier: Uuid, status: TaskStatus) -> bool {
        if let Err(e) = self.task_manager().update_task(task_identifier, status) {
            warn!("Ignoring result: {}", e);
            return false;
        }
        // The scheduler may already be gone
        let _ = self.slots.try_send(());
        true
    }
}
