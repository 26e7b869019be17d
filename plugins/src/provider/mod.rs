//! Per-tool auth file locations and login drivers.

mod auth_files;
mod login;

pub use auth_files::{auth_file_set, auth_file_set_in};
pub use login::ProviderLogin;
