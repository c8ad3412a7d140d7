//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, kebab-case outcome tags)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (fmt subscriber)
//!     → whatever metrics recorder the host process installs
//! ```
//!
//! # Design Decisions
//! - Outcome tags are the event message; details go in fields
//! - Each operation logs inside a span named after it
//! - Metrics are cheap and no-ops when no recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
