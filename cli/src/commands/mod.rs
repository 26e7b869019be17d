pub mod cli;
pub mod cooldown;
pub mod next;
pub mod run;
pub mod vault;

use std::path::PathBuf;
use std::sync::Arc;

use acctswap_core::api::{AppConfig, AuthFileSet, Tool, Vault};
use acctswap_plugins::factory;
use acctswap_plugins::provider::{auth_file_set, auth_file_set_in};
use acctswap_plugins::store::JsonFileStore;

use crate::error::CliError;

/// What every subcommand works against.
pub struct Ctx {
    pub cfg: AppConfig,
    pub vault: Vault,
    pub store: Arc<JsonFileStore>,
    /// Resolve auth files under this directory instead of the real home.
    pub home_override: Option<PathBuf>,
}

impl Ctx {
    pub fn new(cfg: AppConfig) -> Self {
        Self {
            vault: factory::build_vault(&cfg),
            store: factory::build_store(&cfg),
            cfg,
            home_override: None,
        }
    }

    pub fn auth(&self, tool: Tool) -> Result<AuthFileSet, CliError> {
        match &self.home_override {
            Some(home) => Ok(auth_file_set_in(tool, home, None)),
            None => Ok(auth_file_set(tool)?),
        }
    }
}

/// `Some(t)` alone, or every known tool.
pub(crate) fn tools(filter: Option<Tool>) -> Vec<Tool> {
    filter.map(|t| vec![t]).unwrap_or_else(|| Tool::ALL.to_vec())
}
