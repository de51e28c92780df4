use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam::channel::{Receiver, SendError, Sender};
use log::{debug, warn};
use uuid::Uuid;

use crate::containers::defaults::new_extraction_error;
use crate::containers::{AttributeContainer, ContainerRegistry};
use crate::multi_processing::abort::AbortSignal;
use crate::multi_processing::task::{Task, TaskStatus};
use crate::multi_processing::task_manager::TaskManager;
use crate::parsers::{ParserContext, ParserError, ParserRegistry};
use crate::sources::{SourceDescriptor, SourceError, SourceFile};

/// What a worker reports to the collector.
#[derive(Debug)]
pub enum WorkerMessage {
    /// A container produced by a task, in extraction order
    Container {
        task_identifier: Uuid,
        session_identifier: Uuid,
        container: AttributeContainer,
    },
    Completed {
        task_identifier: Uuid,
        parsers: Vec<String>,
        number_of_containers: usize,
    },
    Failed {
        task_identifier: Uuid,
        parsers: Vec<String>,
        parser: Option<String>,
        error: String,
    },
    /// The task was not run to completion because of an abort
    Abandoned { task_identifier: Uuid },
}

type SendResult = Result<(), SendError<WorkerMessage>>;

/// Turns a task's source descriptor into a readable file
pub(crate) type Resolver = fn(&SourceDescriptor) -> Result<SourceFile, SourceError>;

pub(crate) struct Worker {
    pub number: usize,
    pub registry: Arc<ContainerRegistry>,
    pub parsers: Arc<ParserRegistry>,
    pub task_manager: Arc<Mutex<TaskManager>>,
    pub abort: AbortSignal,
    pub resolve: Resolver,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Worker {
    /// Claim tasks until the task queue is closed or the collector is gone
    pub fn run(self, tasks: Receiver<Task>, results: Sender<WorkerMessage>) {
        debug!("Worker {} started", self.number);

        while let Ok(task) = tasks.recv() {
            let outcome = if self.abort.is_aborted() {
                results.send(WorkerMessage::Abandoned {
                    task_identifier: task.identifier,
                })
            } else if self.dispatch(&task) {
                self.process_task(&task, &results)
            } else {
                Ok(())
            };

            if outcome.is_err() {
                debug!("Worker {} lost the collector, stopping", self.number);
                break;
            }
        }

        debug!("Worker {} stopped", self.number);
    }

    fn dispatch(&self, task: &Task) -> bool {
        let mut task_manager = self.task_manager.lock().unwrap_or_else(PoisonError::into_inner);
        match task_manager.update_task(task.identifier, TaskStatus::Dispatched) {
            Ok(()) => true,
            Err(e) => {
                warn!("Worker {} skipping task: {}", self.number, e);
                false
            }
        }
    }

    fn process_task(&self, task: &Task, results: &Sender<WorkerMessage>) -> SendResult {
        let parsers = match self.parsers.select(task.parser_filter_expression.as_deref()) {
            Ok(parsers) => parsers,
            Err(e) => return self.fail(task, Vec::new(), None, &e.to_string(), results),
        };

        let file = match catch_unwind(AssertUnwindSafe(|| (self.resolve)(&task.source))) {
            Ok(Ok(file)) => file,
            Ok(Err(e)) => return self.fail(task, Vec::new(), None, &e.to_string(), results),
            Err(payload) => {
                let message = format!("source resolution panicked: {}", panic_message(payload.as_ref()));
                return self.fail(task, Vec::new(), None, &message, results);
            }
        };

        let context = ParserContext::new(
            &self.registry,
            &task.preprocess,
            task.session_identifier,
            task.identifier,
            &self.abort,
        );

        let mut used = Vec::new();
        let mut failure = None;
        let mut number_of_containers = 0;

        for parser in parsers {
            let supported = catch_unwind(AssertUnwindSafe(|| parser.supports(&file))).unwrap_or(false);
            if !supported {
                continue;
            }
            used.push(parser.name().to_string());

            match catch_unwind(AssertUnwindSafe(|| parser.extract(&context, &file))) {
                Ok(Ok(containers)) => {
                    number_of_containers += containers.len();
                    for container in containers {
                        results.send(WorkerMessage::Container {
                            task_identifier: task.identifier,
                            session_identifier: task.session_identifier,
                            container,
                        })?;
                    }
                }
                Ok(Err(ParserError::Aborted)) => {
                    return results.send(WorkerMessage::Abandoned {
                        task_identifier: task.identifier,
                    });
                }
                Ok(Err(e)) => {
                    warn!("Parser {} failed on {}: {}", parser.name(), task.source, e);
                    failure = Some((parser.name(), e.to_string()));
                }
                Err(payload) => {
                    let message = format!("parser panicked: {}", panic_message(payload.as_ref()));
                    warn!("Parser {} failed on {}: {}", parser.name(), task.source, message);
                    failure = Some((parser.name(), message));
                }
            }
        }

        match failure {
            Some((parser, message)) => self.fail(task, used, Some(parser), &message, results),
            None => results.send(WorkerMessage::Completed {
                task_identifier: task.identifier,
                parsers: used,
                number_of_containers,
            }),
        }
    }

    /// Report a failed task, preceded by its diagnostic container
    fn fail(
        &self,
        task: &Task,
        parsers: Vec<String>,
        parser: Option<&str>,
        message: &str,
        results: &Sender<WorkerMessage>,
    ) -> SendResult {
        warn!("Task {} for {} failed: {}", task.identifier, task.source, message);

        match new_extraction_error(
            &self.registry,
            &task.identifier.to_string(),
            &task.source.to_string(),
            parser,
            message,
        ) {
            Ok(container) => results.send(WorkerMessage::Container {
                task_identifier: task.identifier,
                session_identifier: task.session_identifier,
                container,
            })?,
            Err(e) => warn!("Unable to build extraction error container: {}", e),
        }

        results.send(WorkerMessage::Failed {
            task_identifier: task.identifier,
            parsers,
            parser: parser.map(str::to_string),
            error: message.to_string(),
        })
    }
}
