use crate::error::VaultError;
use crate::provider::AuthFileSet;

use super::Vault;

#[derive(Debug, Clone)]
pub struct ActivateOptions {
    /// Snapshot live auth that matches no stored profile before switching.
    pub backup_current: bool,
    /// Retention for `_backup_*` snapshots; 0 keeps all.
    pub max_auto_backups: usize,
}

impl Default for ActivateOptions {
    fn default() -> Self {
        Self {
            backup_current: true,
            max_auto_backups: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub previous: Option<String>,
    pub backup_name: Option<String>,
    pub original_created: bool,
    pub rotated: Vec<String>,
}

/// Switch the live auth files of `set.tool` to `profile`.
///
/// Live state that is not already saved anywhere is preserved first: the
/// very first activation stores it as `_original`, later ones as a
/// `_backup_*` snapshot subject to rotation.
pub fn activate(
    vault: &Vault,
    set: &AuthFileSet,
    profile: &str,
    opts: &ActivateOptions,
) -> Result<ActivationReport, VaultError> {
    if !vault.exists(&set.tool, profile)? {
        return Err(VaultError::NotFound {
            tool: set.tool.clone(),
            profile: profile.to_string(),
        });
    }

    let mut report = ActivationReport {
        original_created: vault.backup_original(set)?,
        previous: vault.active_profile(set)?,
        ..Default::default()
    };

    if opts.backup_current && report.previous.is_none() && !report.original_created {
        report.backup_name = vault.backup_current(set)?;
        if report.backup_name.is_some() {
            report.rotated = vault.rotate_auto_backups(&set.tool, opts.max_auto_backups)?;
        }
    }

    vault.restore(set, profile)?;
    tracing::debug!(
        target: "acctswap.vault",
        tool = %set.tool,
        profile,
        previous = ?report.previous,
        backup = ?report.backup_name,
        "activated profile"
    );
    Ok(report)
}
