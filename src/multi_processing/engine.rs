use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::constants::{ABORT_POLL_INTERVAL_MS, RESULT_QUEUE_CAPACITY};
use crate::containers::defaults::new_report;
use crate::containers::{ContainerError, ContainerRegistry, PreprocessObject, Session, SessionStatus};
use crate::multi_processing::abort::AbortSignal;
use crate::multi_processing::collector::{Collector, CollectorStatus};
use crate::multi_processing::task::{Task, TaskStatus};
use crate::multi_processing::task_manager::TaskManager;
use crate::multi_processing::worker::Worker;
use crate::parsers::{ParserFilterError, ParserRegistry};
use crate::preprocess::{self, PreprocessPlugin};
use crate::sources::SourceDescriptor;
use crate::storage::{StorageWriter, StoreError};

/// Setup failures of a processing run.
///
/// Per-source extraction failures never surface here; they are recorded in
/// the session counters.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    ParserFilter(#[from] ParserFilterError),

    #[error("container registry misconfiguration: {0}")]
    Registry(#[from] ContainerError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("unable to start worker: {0}")]
    WorkerStart(#[source] std::io::Error),
}

/// Summary of a processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingStatus {
    pub session_identifier: Uuid,
    pub tasks_scheduled: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_abandoned: usize,
    pub containers_written: u64,
    pub containers_rejected: u64,
    pub peak_outstanding_tasks: usize,
    pub aborted: bool,
    /// Workers were still busy when the abort grace period ran out. Their
    /// tasks are recorded as abandoned and the threads are detached, not
    /// killed: they stop at their parser's next abort check or when their
    /// next result cannot be delivered.
    pub forced_termination: bool,
}

/// Orchestrates the preprocess and process phases of an extraction run.
///
/// Extraction runs on a pool of worker threads; a single collector on the
/// calling thread persists their output. The abort signal is shared by every
/// run of the engine and lowered when a run starts.
pub struct MultiProcessEngine {
    config: EngineConfig,
    registry: Arc<ContainerRegistry>,
    parsers: Arc<ParserRegistry>,
    preprocess_plugins: Vec<Box<dyn PreprocessPlugin>>,
    abort: AbortSignal,
}

impl MultiProcessEngine {
    /// Create an engine, installing the container types of every parser.
    ///
    /// The registry must be fully populated before processing starts, so
    /// registration happens here.
    pub fn new(
        config: EngineConfig,
        registry: Arc<ContainerRegistry>,
        parsers: ParserRegistry,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;
        parsers.register_container_schemas(&registry)?;

        Ok(Self {
            config,
            registry,
            parsers: Arc::new(parsers),
            preprocess_plugins: preprocess::default_plugins(),
            abort: AbortSignal::new(),
        })
    }

    /// Engine with the default container types and parsers
    pub fn with_defaults(config: EngineConfig) -> Result<Self, EngineError> {
        let parsers = ParserRegistry::with_default_parsers(config.filestat_hash_max_size_mb);
        let registry = Arc::new(ContainerRegistry::with_default_containers());
        Self::new(config, registry, parsers)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<ContainerRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn parsers(&self) -> &ParserRegistry {
        &self.parsers
    }

    /// Handle to request an abort from another thread
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    /// Preprocess phase: inspect every distinct volume once
    pub fn preprocess_sources(&self, sources: &[SourceDescriptor]) -> PreprocessObject {
        preprocess::preprocess_sources(sources, &self.preprocess_plugins)
    }

    /// Process phase: extract every source into `writer`.
    ///
    /// Schedules one task per source with at most `maximum_number_of_tasks`
    /// queued or dispatched at any instant, collects worker output, then
    /// writes a report, finalizes `session` and closes the writer.
    ///
    /// Fails only on setup errors and storage failures; the session is then
    /// marked failed and the writer closed when possible.
    pub fn process_sources(
        &self,
        session: &mut Session,
        sources: &[SourceDescriptor],
        preprocess: &PreprocessObject,
        writer: &mut dyn StorageWriter,
        parser_filter_expression: Option<&str>,
        maximum_number_of_tasks: usize,
    ) -> Result<ProcessingStatus, EngineError> {
        if session.is_finalized() {
            return Err(EngineError::InvalidConfiguration(format!(
                "session {} is already finalized",
                session.identifier
            )));
        }
        // An abort or storage failure of an earlier run must not leak into this one
        self.abort.reset();

        match self.run(session, sources, preprocess, writer, parser_filter_expression, maximum_number_of_tasks) {
            Ok(status) => Ok(status),
            Err(e) => {
                error!("Processing session {} failed: {}", session.identifier, e);
                session.finalize(SessionStatus::Failed);
                if let Err(close_error) = writer.close(session) {
                    warn!("Unable to close the store after failure: {}", close_error);
                }
                Err(e)
            }
        }
    }

    fn run(
        &self,
        session: &mut Session,
        sources: &[SourceDescriptor],
        preprocess: &PreprocessObject,
        writer: &mut dyn StorageWriter,
        parser_filter_expression: Option<&str>,
        maximum_number_of_tasks: usize,
    ) -> Result<ProcessingStatus, EngineError> {
        if maximum_number_of_tasks == 0 {
            return Err(EngineError::InvalidConfiguration(
                "maximum_number_of_tasks must be at least 1".to_string(),
            ));
        }
        let parser_filter_expression = parser_filter_expression
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        let selected = self.parsers.select(parser_filter_expression.as_deref())?;
        session.parser_filter_expression = parser_filter_expression.clone();

        let start = Instant::now();
        info!(
            "Processing {} sources with parsers: {}",
            sources.len(),
            selected.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        let preprocess_container = preprocess.to_container(&self.registry)?;
        writer.add_container(&preprocess_container)?;
        session.record_container(preprocess_container.container_type(), false);
        session.record_preprocess_warnings(preprocess.warnings.len() as u64);

        let (collected, task_manager) = self.run_pipeline(
            session,
            sources,
            Arc::new(preprocess.clone()),
            writer,
            parser_filter_expression,
            maximum_number_of_tasks,
        )?;

        let aborted = self.abort.is_aborted();
        let mut status = {
            let task_manager = task_manager.lock().unwrap_or_else(PoisonError::into_inner);
            ProcessingStatus {
                session_identifier: session.identifier,
                tasks_scheduled: task_manager.number_of_tasks(),
                tasks_completed: task_manager.count(TaskStatus::Completed),
                tasks_failed: task_manager.count(TaskStatus::Failed),
                tasks_abandoned: task_manager.count(TaskStatus::Abandoned),
                containers_written: collected.containers_written + 1,
                containers_rejected: collected.containers_rejected,
                peak_outstanding_tasks: task_manager.peak_outstanding_tasks(),
                aborted,
                forced_termination: collected.forced_termination,
            }
        };

        let report = new_report(&self.registry, "extraction", &report_text(&status, sources.len(), start.elapsed()))?;
        writer.add_container(&report)?;
        session.record_container(report.container_type(), false);
        status.containers_written += 1;

        session.finalize(if aborted {
            SessionStatus::Aborted
        } else {
            SessionStatus::Completed
        });
        writer.close(session)?;

        info!(
            "Session {} {}: {} tasks completed, {} failed, {} abandoned, {} containers in {:?}",
            session.identifier,
            session.status,
            status.tasks_completed,
            status.tasks_failed,
            status.tasks_abandoned,
            status.containers_written,
            start.elapsed()
        );
        Ok(status)
    }

    /// Start scheduler and workers, then collect on the calling thread
    fn run_pipeline(
        &self,
        session: &mut Session,
        sources: &[SourceDescriptor],
        preprocess: Arc<PreprocessObject>,
        writer: &mut dyn StorageWriter,
        parser_filter_expression: Option<String>,
        maximum_number_of_tasks: usize,
    ) -> Result<(CollectorStatus, Arc<Mutex<TaskManager>>), EngineError> {
        let task_manager = Arc::new(Mutex::new(TaskManager::new()));

        // One token per outstanding task slot
        let (slot_sender, slot_receiver) = bounded::<()>(maximum_number_of_tasks);
        for _ in 0..maximum_number_of_tasks {
            let _ = slot_sender.try_send(());
        }
        let (task_sender, task_receiver) = bounded::<Task>(maximum_number_of_tasks);
        let (result_sender, result_receiver) = bounded(RESULT_QUEUE_CAPACITY);

        let worker_count = self.config.worker_count();
        let mut workers = Vec::with_capacity(worker_count);
        for number in 0..worker_count {
            let worker = Worker {
                number,
                registry: Arc::clone(&self.registry),
                parsers: Arc::clone(&self.parsers),
                task_manager: Arc::clone(&task_manager),
                abort: self.abort.clone(),
                resolve: crate::sources::resolve,
            };
            let worker_tasks = task_receiver.clone();
            let worker_results = result_sender.clone();

            let handle = thread::Builder::new()
                .name(format!("extraction-worker-{}", number))
                .spawn(move || worker.run(worker_tasks, worker_results));
            match handle {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Closing the task queue stops the workers already running
                    self.abort.abort();
                    return Err(EngineError::WorkerStart(e));
                }
            }
        }
        drop(task_receiver);
        drop(result_sender);
        debug!("Started {} extraction workers", worker_count);

        let scheduler = {
            let sources = sources.to_vec();
            let session_identifier = session.identifier;
            let task_manager = Arc::clone(&task_manager);
            let abort = self.abort.clone();
            thread::Builder::new()
                .name("task-scheduler".to_string())
                .spawn(move || {
                    schedule_tasks(
                        sources,
                        session_identifier,
                        parser_filter_expression,
                        preprocess,
                        slot_receiver,
                        task_sender,
                        task_manager,
                        abort,
                    )
                })
                .map_err(|e| {
                    self.abort.abort();
                    EngineError::WorkerStart(e)
                })?
        };

        let collector = Collector::new(
            writer,
            session,
            &self.registry,
            Arc::clone(&task_manager),
            slot_sender,
            self.abort.clone(),
            Duration::from_secs(self.config.abort_grace_timeout_secs),
        );
        let collected = collector.run(result_receiver)?;

        if collected.forced_termination {
            warn!("Detaching {} workers still running after the abort grace period", workers.len());
        } else {
            join_thread(scheduler);
            for worker in workers {
                join_thread(worker);
            }
        }

        Ok((collected, task_manager))
    }
}

fn join_thread(handle: JoinHandle<()>) {
    let name = handle.thread().name().unwrap_or("unnamed").to_string();
    if handle.join().is_err() {
        error!("Thread {} panicked", name);
    }
}

/// Enqueue one task per source in order, holding a slot for each
#[allow(clippy::too_many_arguments)]
fn schedule_tasks(
    sources: Vec<SourceDescriptor>,
    session_identifier: Uuid,
    parser_filter_expression: Option<String>,
    preprocess: Arc<PreprocessObject>,
    slots: Receiver<()>,
    tasks: Sender<Task>,
    task_manager: Arc<Mutex<TaskManager>>,
    abort: AbortSignal,
) {
    let poll_interval = Duration::from_millis(ABORT_POLL_INTERVAL_MS);

    for source in sources {
        loop {
            if abort.is_aborted() {
                info!("Abort requested, no further tasks scheduled");
                return;
            }
            match slots.recv_timeout(poll_interval) {
                Ok(()) => break,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        let task = Task::new(
            session_identifier,
            source,
            parser_filter_expression.clone(),
            Arc::clone(&preprocess),
        );
        task_manager
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .create_task(&task);

        if tasks.send(task).is_err() {
            warn!("No extraction workers left, stopping scheduling");
            return;
        }
    }
    debug!("All tasks scheduled");
}

fn report_text(status: &ProcessingStatus, number_of_sources: usize, elapsed: Duration) -> String {
    format!(
        "Processed {} of {} sources in {:.2}s: {} completed, {} failed, {} abandoned. \
         Peak outstanding tasks: {}.{}",
        status.tasks_scheduled,
        number_of_sources,
        elapsed.as_secs_f64(),
        status.tasks_completed,
        status.tasks_failed,
        status.tasks_abandoned,
        status.peak_outstanding_tasks,
        if status.aborted { " Processing was aborted." } else { "" }
    )
}
