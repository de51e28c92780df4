//! Global constants for the rs-timeline application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Store file format constants
/// Store file header signature
pub const STORE_HEADER_MAGIC: &[u8; 8] = b"RTLSTORE";

/// Store file footer signature
pub const STORE_FOOTER_MAGIC: &[u8; 8] = b"RTLFOOT1";

/// Current store format version
pub const STORE_FORMAT_VERSION: u32 = 1;

/// Header size: magic, version, session identifier
pub const STORE_HEADER_SIZE: u64 = 8 + 4 + 16;

/// Footer size: index offset, session offset, magic
pub const STORE_FOOTER_SIZE: u64 = 8 + 8 + 8;

/// Record frame prefix size: payload length and CRC32
pub const STORE_FRAME_PREFIX_SIZE: u64 = 4 + 4;

/// Largest record payload accepted by the reader (64MB)
pub const STORE_MAX_RECORD_SIZE: u32 = 64 * 1024 * 1024;

/// Index entries per index segment frame, well below the record size limit
pub const STORE_INDEX_SEGMENT_LENGTH: usize = 100_000;

// Engine constants
/// Default bound on queued plus dispatched tasks
pub const DEFAULT_MAXIMUM_NUMBER_OF_TASKS: usize = 100;

/// Upper bound for the default number of worker threads
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Capacity of the worker to collector channel
pub const RESULT_QUEUE_CAPACITY: usize = 1000;

/// Default grace period for in-flight tasks after an abort, in seconds
pub const DEFAULT_ABORT_GRACE_TIMEOUT_SECS: u64 = 30;

/// Interval at which blocked loops re-check the abort signal, in milliseconds
pub const ABORT_POLL_INTERVAL_MS: u64 = 100;

/// Progress reporting interval in containers
pub const PROGRESS_REPORT_INTERVAL: u64 = 10_000;

// Extraction constants
/// Buffer size for hashing source files (1MB)
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Paths skipped by default when enumerating a live file system
pub const DEFAULT_SKIP_PATHS: &[&str] = &["/proc", "/sys", "/dev"];

/// Parser presets usable in parser filter expressions
pub const PARSER_PRESETS: &[(&str, &[&str])] = &[
    ("linux", &["filestat"]),
    ("macos", &["filestat", "macwifi"]),
];
