//! Parallel extraction engine.
//!
//! ## Pipeline
//!
//! ```text
//!  scheduler ──tasks (bounded)──> workers ──results (bounded)──> collector ──> StorageWriter
//!      ^                                                             │
//!      └──────────────────── slot tokens ────────────────────────────┘
//! ```
//!
//! - The scheduler takes one slot token per source before queueing its
//!   task, in source order. There are `maximum_number_of_tasks` tokens.
//! - Workers claim tasks, run the selected parsers and stream containers.
//! - The collector persists containers, records terminal task states and
//!   hands the task's token back to the scheduler.
//!
//! The run ends when the scheduler and every worker have dropped their
//! senders and the result queue is drained.

/// Global abort signal
pub mod abort;

/// Persisting worker output
pub mod collector;

/// Preprocess and process orchestration
pub mod engine;

/// Units of work
pub mod task;

/// Task state bookkeeping
pub mod task_manager;

/// Extraction worker loop
pub mod worker;

pub use abort::AbortSignal;
pub use collector::{Collector, CollectorStatus};
pub use engine::{EngineError, MultiProcessEngine, ProcessingStatus};
pub use task::{Task, TaskStatus};
pub use task_manager::{TaskManager, TaskStateError};
pub use worker::WorkerMessage;
