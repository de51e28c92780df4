//! Utility functions for timeline extraction.
//!
//! ## Components
//!
//! - **Hashing**: SHA-256 calculation for file integrity
//! - **Summary**: JSON summary of a closed store
//!
//! ### Generating File Hashes
//!
//! ```no_run
//! use rust_timeline::utils::hash::calculate_sha256;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let file_path = Path::new("/evidence/wifi.log");
//!
//! match calculate_sha256(file_path, 1024)? {
//!     Some(hash) => println!("SHA-256: {}", hash),
//!     None => println!("File exceeds size limit"),
//! }
//! # Ok(())
//! # }
//! ```

/// Store summary generation
pub mod summary;

/// Cryptographic hash calculation utilities
pub mod hash;
