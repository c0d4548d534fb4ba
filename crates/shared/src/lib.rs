//! CropSense shared utilities
//!
//! Database pool construction and migrations, shared by the backend crates
//! and the integration test suites.

pub mod db;

pub use db::*;
