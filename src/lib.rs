pub mod access_policy;
pub mod config;
pub mod database_sea;
pub mod error;
pub mod models;
pub mod resource_store;
pub mod user_store;
pub mod validation;
pub mod web_server;

pub use access_policy::{AccessPolicy, Audience, Requester};
pub use config::{AppConfig, ConfigError};
pub use error::{AppError, ValidationErrors};
pub use resource_store::ResourceStore;
pub use user_store::UserStore;
