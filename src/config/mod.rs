/// Application settings loaded from config.toml and environment variables
pub mod app;

/// Database connection lifecycle and schema creation
pub mod database;

/// Initial suppliers and products from config.toml
pub mod seed;

pub use app::{AppConfig, load_app_configuration};
