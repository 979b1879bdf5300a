pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::{create_cors_layer, create_router};
