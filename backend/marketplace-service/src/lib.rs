pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod push;
pub mod services;
pub mod state;
pub mod store;
pub mod triggers;

pub use config::Config;
pub use error::{ApiResponse, ServiceError, ServiceResult};
pub use state::AppState;
