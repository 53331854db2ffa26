// Public API for integration tests and potential library usage

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod password;
pub mod store;
pub mod types;
