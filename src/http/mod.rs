//! Ad-hoc mapping endpoint.
//!
//! # Data Flow
//! ```text
//! POST /v0/external_ports
//!     → server.rs (request ID, tracing, body limit)
//!     → handlers.rs (decode JSON → Updater::create_external_port_mappings)
//!     → 200 / 400 / 500, empty body
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, ApiServer, ApiState};
