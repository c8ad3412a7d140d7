//! Desired-state data model shared by the control plane, the ad-hoc endpoint
//! and the routing table.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The TCP port on which the load balancer accepts traffic for a routed service.
pub type ExternalPort = u16;

/// One backend instance. Identity is `(address, port)`; the derived ordering
/// sorts by address first, then port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackendHostInfo {
    pub address: String,
    pub port: u16,
}

impl BackendHostInfo {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for BackendHostInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Desired mapping of one external port to a pool of backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRequest {
    pub external_port: ExternalPort,
    #[serde(default)]
    pub backends: Vec<BackendHostInfo>,
}

impl MappingRequest {
    pub fn new(external_port: ExternalPort, backends: Vec<BackendHostInfo>) -> Self {
        Self {
            external_port,
            backends,
        }
    }

    /// Check the request field by field, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.external_port == 0 {
            return Err(ValidationError::InvalidExternalPort);
        }

        for backend in &self.backends {
            if backend.address.is_empty() {
                return Err(ValidationError::EmptyBackendAddress {
                    external_port: self.external_port,
                });
            }
            if backend
                .address
                .chars()
                .any(|c| c.is_whitespace() || c.is_control())
            {
                return Err(ValidationError::InvalidBackendAddress {
                    external_port: self.external_port,
                    address: backend.address.clone(),
                });
            }
            if backend.port == 0 {
                return Err(ValidationError::InvalidBackendPort {
                    external_port: self.external_port,
                    address: backend.address.clone(),
                });
            }
        }

        Ok(())
    }
}

/// A malformed or invalid mapping request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid mapping request: external port must be greater than 0")]
    InvalidExternalPort,

    #[error("invalid mapping request: backend {address} for external port {external_port} must have a port greater than 0")]
    InvalidBackendPort {
        external_port: ExternalPort,
        address: String,
    },

    #[error("invalid mapping request: backend for external port {external_port} has an empty address")]
    EmptyBackendAddress { external_port: ExternalPort },

    /// Whitespace or control characters would split the rendered directive.
    #[error("invalid mapping request: backend address {address:?} for external port {external_port} contains whitespace or control characters")]
    InvalidBackendAddress {
        external_port: ExternalPort,
        address: String,
    },
}

/// Validate a batch of requests in order; the first invalid field wins.
pub fn validate_mapping_requests(requests: &[MappingRequest]) -> Result<(), ValidationError> {
    requests.iter().try_for_each(MappingRequest::validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let request = MappingRequest::new(1234, vec![BackendHostInfo::new("1.2.3.4", 1234)]);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_zero_external_port_rejected() {
        let request = MappingRequest::new(0, vec![BackendHostInfo::new("1.2.3.4", 1234)]);
        assert_eq!(request.validate(), Err(ValidationError::InvalidExternalPort));
    }

    #[test]
    fn test_zero_backend_port_rejected() {
        let request = MappingRequest::new(1234, vec![BackendHostInfo::new("1.2.3.4", 0)]);
        assert_eq!(
            request.validate(),
            Err(ValidationError::InvalidBackendPort {
                external_port: 1234,
                address: "1.2.3.4".into(),
            })
        );
    }

    #[test]
    fn test_empty_address_rejected() {
        let request = MappingRequest::new(1234, vec![BackendHostInfo::new("", 80)]);
        assert_eq!(
            request.validate(),
            Err(ValidationError::EmptyBackendAddress { external_port: 1234 })
        );
    }

    #[test]
    fn test_address_with_whitespace_rejected() {
        for address in ["10.0.0.1 check", "10.0.0.1\n  server evil 6.6.6.6:1", "10.0.0.1\t", "a\u{0}b"] {
            let request = MappingRequest::new(1234, vec![BackendHostInfo::new(address, 80)]);
            assert_eq!(
                request.validate(),
                Err(ValidationError::InvalidBackendAddress {
                    external_port: 1234,
                    address: address.into(),
                }),
                "{address:?}"
            );
        }
    }

    #[test]
    fn test_first_invalid_request_reported() {
        let requests = vec![
            MappingRequest::new(1000, vec![BackendHostInfo::new("10.0.0.1", 80)]),
            MappingRequest::new(2000, vec![BackendHostInfo::new("10.0.0.2", 0)]),
            MappingRequest::new(0, vec![]),
        ];
        let err = validate_mapping_requests(&requests).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidBackendPort { external_port: 2000, .. }));
    }

    #[test]
    fn test_backend_ordering_by_address_then_port() {
        let mut backends = vec![
            BackendHostInfo::new("10.0.0.2", 80),
            BackendHostInfo::new("10.0.0.1", 9000),
            BackendHostInfo::new("10.0.0.1", 80),
        ];
        backends.sort();
        assert_eq!(backends[0], BackendHostInfo::new("10.0.0.1", 80));
        assert_eq!(backends[1], BackendHostInfo::new("10.0.0.1", 9000));
        assert_eq!(backends[2], BackendHostInfo::new("10.0.0.2", 80));
    }

    #[test]
    fn test_mapping_request_json_shape() {
        let json = r#"{"external_port":1234,"backends":[{"address":"1.2.3.4","port":5678}]}"#;
        let request: MappingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.external_port, 1234);
        assert_eq!(request.backends, vec![BackendHostInfo::new("1.2.3.4", 5678)]);
    }
}
