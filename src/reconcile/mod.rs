//! Reconciliation engine.
//!
//! # Data Flow
//! ```text
//! Syncer ──tick──▶ sync channel (1 slot) ──▶ Watcher ──▶ Updater::sync()
//!                                                          │ token → fetch_all → reconcile_to
//! routing API ──event stream──▶ Watcher ──▶ Updater::handle_event()
//!                                                          │ set / remove
//!                                                          ▼
//!                                          (changed?) Updater::configure()
//!                                                          │ snapshot → RouterConfigurer
//! ad-hoc endpoint ──▶ Updater::create_external_port_mappings()
//! ```
//!
//! # Design Decisions
//! - The Updater is the single writer; every table mutation goes through it
//! - Mutations are serialized with an async lock held from fetch to reconcile,
//!   so an event can never be overwritten by an older full snapshot
//! - Applies are serialized separately and snapshot the table only once they
//!   hold the apply lock, so the last apply always sees the latest table
//! - Blocking configuration I/O runs on the blocking pool and is never cancelled

pub mod syncer;
pub mod updater;
pub mod watcher;

pub use syncer::{sync_channel, Syncer};
pub use updater::{SyncError, Updater};
pub use watcher::Watcher;
