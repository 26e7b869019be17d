pub mod factory;
pub mod notify;
pub mod provider;
pub mod pty;
pub mod store;
