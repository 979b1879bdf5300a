pub mod gateway_port;
pub mod order_repository_port;
pub mod settings_port;

pub use gateway_port::{
    GatewayAdapter, GatewayPayment, PaymentIntentRequest, SignatureCheck, WebhookRequest,
};
pub use order_repository_port::OrderRepositoryPort;
pub use settings_port::{load_credentials, SettingsPort};
