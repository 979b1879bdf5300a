pub mod adapters;
pub mod config;
pub mod gateways;
pub mod signature;

pub use config::AppConfig;
pub use gateways::GatewayRegistry;
