//! CropSense API library
//!
//! This crate contains the HTTP layer of the CropSense backend: routing,
//! authentication, configuration, and error mapping. The billing and
//! recommendation logic lives in the `cropsense-billing` and
//! `cropsense-engine` crates.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
