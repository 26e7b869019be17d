pub mod api;
pub mod config;
pub mod error;
pub mod handoff;
pub mod provider;
pub mod ratelimit;
pub mod rotation;
pub mod store;
pub mod text;
pub mod vault;
