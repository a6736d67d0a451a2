pub mod schema;

pub use schema::{Config, GatewayConfig, OllamaConfig, StorageConfig};
