//! HTTP API handlers

pub mod analysis;
pub mod auth;
pub mod gallery;
pub mod health;

pub use analysis::analysis_routes;
pub use auth::auth_routes;
pub use gallery::gallery_routes;
pub use health::health_routes;
