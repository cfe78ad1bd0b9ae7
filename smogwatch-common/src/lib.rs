//! # Smogwatch Common Library
//!
//! Shared code for the smogwatch backend:
//! - Error types
//! - Configuration loading
//! - Authentication primitives (password hashing, JWT tokens)

pub mod auth;
pub mod config;
pub mod error;

pub use config::Config;
pub use error::{Error, Result};
