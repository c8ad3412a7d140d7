//! TCP router configurer library.

pub mod config;
pub mod configurer;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod routing;
pub mod routing_api;
pub mod token;

pub use config::schema::RouterConfig;
pub use configurer::{ConfigureError, HaProxyConfigurer, RouterConfigurer};
pub use lifecycle::Shutdown;
pub use reconcile::Updater;
