//! Local control API and block exchange contract for a content-addressed storage node.

pub mod config;
pub mod exchange;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::NodeConfig;
pub use exchange::{Exchange, ExchangeClient};
pub use lifecycle::{ApiService, ServiceError, StopOutcome};
