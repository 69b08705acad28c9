pub mod adapters;
pub mod api;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use api::{build_router, AppState};
pub use config::AppConfig;
pub use core::reconciler::{GroupReconciler, GroupRules, ReconcileError};
pub use utils::error::{AppError, Result};
