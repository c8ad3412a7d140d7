//! Metrics collection.
//!
//! # Metrics
//! - `router_configurer_events_total` (counter): change events applied, by action
//! - `router_configurer_syncs_total` (counter): full syncs, by outcome
//! - `router_configurer_configures_total` (counter): configuration applies, by outcome
//! - `router_configurer_subscriptions_total` (counter): subscription attempts, by outcome
//! - `router_configurer_routing_table_ports` (gauge): ports currently routed
//!
//! # Design Decisions
//! - Facade only; no exporter endpoint is served from this process
//! - Outcome labels are a small fixed set

use crate::routing::Action;

pub fn record_event(action: Action, changed: bool) {
    metrics::counter!(
        "router_configurer_events_total",
        "action" => action.as_str(),
        "changed" => if changed { "true" } else { "false" }
    )
    .increment(1);
}

/// `outcome` is one of `changed`, `unchanged`, `failed`.
pub fn record_sync(outcome: &'static str) {
    metrics::counter!("router_configurer_syncs_total", "outcome" => outcome).increment(1);
}

pub fn record_configure(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("router_configurer_configures_total", "outcome" => outcome).increment(1);
}

pub fn record_subscription(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("router_configurer_subscriptions_total", "outcome" => outcome).increment(1);
}

pub fn set_routing_table_ports(ports: usize) {
    metrics::gauge!("router_configurer_routing_table_ports").set(ports as f64);
}
