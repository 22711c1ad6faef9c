//! HTTP API handlers for textsense-ta

pub mod analysis;
pub mod auth;
pub mod health;
pub mod status;

pub use analysis::{analyze_single, analyze_text};
pub use auth::auth_middleware;
pub use health::health_routes;
pub use status::{models_status, service_info};
