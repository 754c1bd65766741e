pub mod config;
pub mod error;
pub mod export;
pub mod github;
pub mod reputation;
pub mod webhook;

pub use error::{ReputationError, Result};
