//! Routing state subsystem.
//!
//! # Data Flow
//! ```text
//! Control plane event / full fetch / ad-hoc request
//!     → types.rs (MappingRequest, BackendHostInfo, validation)
//!     → event.rs (ChangeEvent: Upsert | Delete)
//!     → table.rs (RoutingTable: set / remove / reconcile_to)
//!     → RoutingTableSnapshot (immutable copy handed to the configurer)
//! ```
//!
//! # Design Decisions
//! - One table per process, rebuilt from the control plane on restart
//! - Entries are ordered sets so snapshots render deterministically
//! - An emptied entry is removed, never stored
//! - Only the updater mutates the table

pub mod event;
pub mod table;
pub mod types;

pub use event::{Action, ChangeEvent};
pub use table::{ReconcileDiff, RoutingTable, RoutingTableEntry, RoutingTableSnapshot};
pub use types::{
    validate_mapping_requests, BackendHostInfo, ExternalPort, MappingRequest, ValidationError,
};
