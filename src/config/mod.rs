pub mod app_config;
#[cfg(feature = "cli")]
pub mod cli;

pub use app_config::{AppConfig, AuthConfig, GroupsConfig, ServerConfig, StoreBackend, StoreConfig};
#[cfg(feature = "cli")]
pub use cli::CliConfig;
