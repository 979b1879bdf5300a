pub mod memory_order_repository;
pub mod mysql_order_repository;
pub mod settings_providers;

pub use memory_order_repository::InMemoryOrderRepository;
pub use mysql_order_repository::MySqlOrderRepository;
pub use settings_providers::{EnvSettingsProvider, MySqlSettingsProvider};
#[cfg(test)]
pub use settings_providers::StaticSettingsProvider;
