#![forbid(unsafe_code)]

pub mod config;
pub mod errors;
pub mod harvest;
pub mod indexing;
pub mod models;
pub mod narrative;
pub mod orchestrator;
pub mod persistence;
pub mod server;
pub mod state;
pub mod workspace;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
