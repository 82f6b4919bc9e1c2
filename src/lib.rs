// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod identity;
pub mod persist;
pub mod ratelimit;
pub mod state;
pub mod store;
pub mod tally;
pub mod types;
pub mod validation;
