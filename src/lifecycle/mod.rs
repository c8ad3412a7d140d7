//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Configurer (fatal if base template unreadable) → token fetcher
//!     → routing API client → Updater → bind API listener → Supervisor
//!
//! Supervision (supervisor.rs):
//!     Start members in order → first exit or OS signal → stop the rest in
//!     reverse order → first error becomes the exit status
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → ordered shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Every member has its own shutdown handle so stop order is explicit
//! - A member exiting cleanly still stops the group

pub mod shutdown;
pub mod signals;
pub mod startup;
pub mod supervisor;

pub use shutdown::Shutdown;
pub use startup::{run, StartupError};
pub use supervisor::{BoxError, Error, Supervisor};
