//! Browser sessions for scrape orchestration.
//!
//! Provides the page operations extractors may use, a session lifecycle
//! (open, recycle, close) with one install-and-retry fallback on launch
//! failure, and a chromiumoxide-backed implementation that notices when
//! the browser process goes away.

pub mod actions;
pub mod engine;
pub mod error;
pub mod session;

pub use actions::PageActions;
pub use engine::{ChromiumPage, ChromiumProvider, ChromiumSession};
pub use error::{BrowserError, Result};
pub use session::{Session, SessionManager, SessionProvider};
