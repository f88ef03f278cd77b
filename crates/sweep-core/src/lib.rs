//! Sweep Core - Foundation crate for the sweep scrape-validation workspace.
//!
//! This crate provides the data model every other crate agrees on, the
//! contracts between the orchestrator and its collaborators, error types
//! and configuration management.
//!
//! # Modules
//!
//! - [`types`] - `Item`, `ResultTag`, `Payload`, `RunId`
//! - [`format`] - Display formatting for result tags, kept apart from classification
//! - [`checkpoint`] - The `CheckpointSink` contract for durable persistence
//! - [`progress`] - The write-only progress/status reporting contract
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//!
//! # Example
//!
//! ```rust
//! use sweep_core::{AppConfig, PlainFormatter, ResultTag, StatusFormatter};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.run.batch_size, 10);
//!
//! let tag = ResultTag::success("registered");
//! assert!(tag.is_terminal());
//! assert_eq!(PlainFormatter.render(&tag), "registered");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod format;
pub mod progress;
pub mod types;

// Re-export commonly used types
pub use checkpoint::{CheckpointSink, SinkError};
pub use config::{AppConfig, BrowserConfig, RunConfig, StorageConfig};
pub use error::{ConfigError, ConfigResult, Result, SweepError};
pub use format::{PlainFormatter, StatusFormatter};
pub use progress::{NoopProgress, ProgressReporter, TracingProgress};
pub use types::{Item, Payload, ResultKind, ResultTag, RunId};
