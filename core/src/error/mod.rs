mod config_error;
mod handoff_error;
mod pty_error;
mod select_error;
mod store_error;
mod vault_error;

pub use config_error::ConfigError;
pub use handoff_error::HandoffError;
pub use pty_error::PtyError;
pub use select_error::SelectError;
pub use store_error::StoreError;
pub use vault_error::VaultError;
