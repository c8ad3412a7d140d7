//! Change events pushed by the control plane.

use serde::{Deserialize, Serialize};

use crate::routing::types::MappingRequest;

/// What a change event does to its external port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Upsert,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Upsert => "upsert",
            Action::Delete => "delete",
        }
    }
}

/// One incremental change received on the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub action: Action,
    pub mapping: MappingRequest,
}

impl ChangeEvent {
    pub fn upsert(mapping: MappingRequest) -> Self {
        Self {
            action: Action::Upsert,
            mapping,
        }
    }

    pub fn delete(mapping: MappingRequest) -> Self {
        Self {
            action: Action::Delete,
            mapping,
        }
    }
}
