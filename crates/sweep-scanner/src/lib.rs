//! Sweep Scanner - resumable orchestration of extractors.
//!
//! This crate turns an ordered list of items into an index-aligned list of
//! results while tolerating flaky sites, browser crashes, partial progress
//! and checkpoint write failures.
//!
//! # Features
//!
//! - Resume from earlier results, skipping what is already decided
//! - Periodic browser renewal to bound resource growth
//! - Crash recovery with a single retry of the affected item
//! - Checkpointing on a fixed cadence plus a guaranteed final flush
//! - Sequential or chunked concurrent execution
//!
//! # Example
//!
//! ```rust,ignore
//! use sweep_scanner::{JsonFileSink, Orchestrator, RunOptions};
//!
//! let provider = ChromiumProvider::new(config.browser.clone());
//! let extractor = MicrochipExtractor::new();
//! let sink = JsonFileSink::new("run.json");
//!
//! let report = Orchestrator::new(&provider, &extractor)
//!     .with_sink(&sink)
//!     .run(&items, RunOptions::default())
//!     .await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod context;
pub mod error;
pub mod json_sink;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod progress;
pub mod store;

// Re-export commonly used types
pub use context::{RunReport, RunStats};
pub use error::{Result, ScanError};
pub use json_sink::{load_checkpoint, JsonFileSink};
pub use normalize::normalize_item;
pub use options::{ExecutionMode, ResumePolicy, RunOptions};
pub use orchestrator::Orchestrator;
pub use progress::{ChannelProgress, ProgressEvent};
pub use store::ResultStore;
