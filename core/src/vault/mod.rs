//! Content-addressed backup/restore store for tool auth files.
//!
//! Layout: `<base>/<tool>/<profile>/<basename of each auth file>` plus a
//! `meta.json` written last. Profiles whose name starts with `_` are system
//! profiles: `_original` is the one-time snapshot of pre-acctswap state and
//! `_backup_<YYYYMMDD_HHMMSS>` are rotation-managed safety snapshots.

mod activate;
pub(crate) mod fsops;
mod meta;
mod paths;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};

use crate::error::VaultError;
use crate::provider::{AuthFileSet, AuthFileSpec};

pub use activate::{activate, ActivateOptions, ActivationReport};
pub use fsops::atomic_write;
pub use meta::{CreatedBy, ProfileKind, ProfileMeta, META_FILE};

pub const ORIGINAL_PROFILE: &str = "_original";
pub const AUTO_BACKUP_PREFIX: &str = "_backup_";

pub fn is_system_profile(name: &str) -> bool {
    name.starts_with('_')
}

/// Vault-wide view of one stored profile.
#[derive(Debug, Clone)]
pub struct ProfileEntry {
    pub name: String,
    pub meta: Option<ProfileMeta>,
}

#[derive(Debug, Clone)]
pub struct Vault {
    base: PathBuf,
}

impl Vault {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Validated `<base>/<tool>`.
    pub fn tool_dir(&self, tool: &str) -> Result<PathBuf, VaultError> {
        paths::validate_segment("tool", tool)?;
        paths::ensure_within(&self.base, &self.base.join(tool))
    }

    /// Validated `<base>/<tool>/<profile>`.
    pub fn profile_dir(&self, tool: &str, profile: &str) -> Result<PathBuf, VaultError> {
        paths::validate_segment("tool", tool)?;
        paths::validate_segment("profile", profile)?;
        paths::ensure_within(&self.base, &self.base.join(tool).join(profile))
    }

    pub fn exists(&self, tool: &str, profile: &str) -> Result<bool, VaultError> {
        Ok(self.profile_dir(tool, profile)?.is_dir())
    }

    /// Save the tool's current auth files as `profile` (created by the user).
    pub fn backup(&self, set: &AuthFileSet, profile: &str) -> Result<(), VaultError> {
        self.backup_as(set, profile, CreatedBy::User)
    }

    pub fn backup_as(
        &self,
        set: &AuthFileSet,
        profile: &str,
        created_by: CreatedBy,
    ) -> Result<(), VaultError> {
        let dir = self.profile_dir(&set.tool, profile)?;
        let existed = dir.is_dir();
        if existed && is_system_profile(profile) {
            return Err(VaultError::ProtectedProfile {
                tool: set.tool.clone(),
                profile: profile.to_string(),
            });
        }

        // Check required files up front so a missing one mutates nothing.
        let mut sources: Vec<&AuthFileSpec> = Vec::new();
        for spec in &set.files {
            if spec.path.is_file() {
                sources.push(spec);
            } else if spec.required {
                return Err(VaultError::MissingRequired {
                    path: spec.path.clone(),
                });
            } else {
                tracing::debug!(
                    target: "acctswap.vault",
                    path = %spec.path.display(),
                    "optional auth file not present, skipping"
                );
            }
        }
        if sources.is_empty() {
            return Err(VaultError::NothingCopied {
                tool: set.tool.clone(),
            });
        }

        fsops::create_dir_private(&dir)?;
        let result = self.copy_into_profile(set, &dir, &sources);
        if result.is_err() && !existed {
            let _ = fs::remove_dir_all(&dir);
        }
        let original_paths = result?;

        let meta = ProfileMeta {
            tool: set.tool.clone(),
            profile: profile.to_string(),
            backed_up_at: Utc::now(),
            files: original_paths.len(),
            kind: if is_system_profile(profile) {
                ProfileKind::System
            } else {
                ProfileKind::User
            },
            created_by,
            original_paths,
        };
        let meta_path = dir.join(META_FILE);
        fsops::write_atomic(&meta_path, &meta::encode_meta(&meta_path, &meta)?)
    }

    fn copy_into_profile(
        &self,
        set: &AuthFileSet,
        dir: &Path,
        sources: &[&AuthFileSpec],
    ) -> Result<Vec<String>, VaultError> {
        let mut copied = Vec::with_capacity(sources.len());
        for spec in sources {
            let dest = stored_path(dir, spec)?;
            fsops::copy_atomic(&spec.path, &dest)?;
            copied.push(spec.path.display().to_string());
        }

        // Drop copies of optional files that no longer exist live, so a later
        // restore does not resurrect another account's settings.
        for spec in set.files.iter().filter(|s| !s.path.is_file()) {
            let stale = stored_path(dir, spec)?;
            if stale.is_file() {
                fs::remove_file(&stale).map_err(|e| VaultError::io(&stale, e))?;
            }
        }
        Ok(copied)
    }

    /// Copy the stored files of `profile` back over the live auth locations.
    pub fn restore(&self, set: &AuthFileSet, profile: &str) -> Result<(), VaultError> {
        let dir = self.profile_dir(&set.tool, profile)?;
        if !dir.is_dir() {
            return Err(VaultError::NotFound {
                tool: set.tool.clone(),
                profile: profile.to_string(),
            });
        }

        let mut pairs: Vec<(PathBuf, &AuthFileSpec)> = Vec::new();
        for spec in &set.files {
            let src = stored_path(&dir, spec)?;
            if src.is_file() {
                pairs.push((src, spec));
            } else if spec.required {
                return Err(VaultError::MissingRequired { path: src });
            }
        }
        if pairs.is_empty() {
            return Err(VaultError::NothingRestored {
                tool: set.tool.clone(),
                profile: profile.to_string(),
            });
        }

        for (src, spec) in pairs {
            if let Some(parent) = spec.path.parent() {
                fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
            }
            fsops::copy_atomic(&src, &spec.path)?;
        }
        Ok(())
    }

    /// Name of the stored profile whose files match the live auth files, if any.
    ///
    /// User profiles are preferred over system snapshots when both match.
    pub fn active_profile(&self, set: &AuthFileSet) -> Result<Option<String>, VaultError> {
        let mut current: HashMap<PathBuf, String> = HashMap::new();
        for spec in set.present() {
            let Some(name) = spec.file_name() else {
                continue;
            };
            current.insert(PathBuf::from(name), fsops::sha256_file(&spec.path)?);
        }
        if current.is_empty() {
            return Ok(None);
        }

        let mut profiles = self.list(&set.tool)?;
        profiles.sort_by_key(|p| is_system_profile(p));

        let tool_dir = self.tool_dir(&set.tool)?;
        for profile in profiles {
            let dir = tool_dir.join(&profile);
            let mut all_match = true;
            for (name, hash) in &current {
                let stored = dir.join(name);
                if !stored.is_file() || &fsops::sha256_file(&stored)? != hash {
                    all_match = false;
                    break;
                }
            }
            if all_match {
                return Ok(Some(profile));
            }
        }
        Ok(None)
    }

    /// Profile names for `tool`, sorted. Missing tool directory means no profiles.
    pub fn list(&self, tool: &str) -> Result<Vec<String>, VaultError> {
        let dir = self.tool_dir(tool)?;
        list_dirs(&dir)
    }

    pub fn list_entries(&self, tool: &str) -> Result<Vec<ProfileEntry>, VaultError> {
        let mut out = Vec::new();
        for name in self.list(tool)? {
            let meta = self.read_meta(tool, &name).ok();
            out.push(ProfileEntry { name, meta });
        }
        Ok(out)
    }

    /// Every tool directory in the vault with its profiles.
    pub fn list_all(&self) -> Result<BTreeMap<String, Vec<String>>, VaultError> {
        let mut out = BTreeMap::new();
        for tool in list_dirs(&self.base)? {
            if paths::validate_segment("tool", &tool).is_err() {
                continue;
            }
            let profiles = self.list(&tool)?;
            if !profiles.is_empty() {
                out.insert(tool, profiles);
            }
        }
        Ok(out)
    }

    pub fn read_meta(&self, tool: &str, profile: &str) -> Result<ProfileMeta, VaultError> {
        let dir = self.profile_dir(tool, profile)?;
        meta::read_meta(&dir.join(META_FILE))
    }

    /// Delete a user profile. System profiles need [`Vault::delete_force`].
    pub fn delete(&self, tool: &str, profile: &str) -> Result<(), VaultError> {
        let dir = self.profile_dir(tool, profile)?;
        if is_system_profile(profile) {
            return Err(VaultError::ProtectedProfile {
                tool: tool.to_string(),
                profile: profile.to_string(),
            });
        }
        remove_profile_dir(tool, profile, &dir)
    }

    pub fn delete_force(&self, tool: &str, profile: &str) -> Result<(), VaultError> {
        let dir = self.profile_dir(tool, profile)?;
        remove_profile_dir(tool, profile, &dir)
    }

    /// Snapshot the pre-acctswap auth state as `_original`, exactly once.
    ///
    /// Returns whether a snapshot was taken. Nothing happens when `_original`
    /// already exists, when there are no live auth files, or when the live
    /// files already match a stored profile.
    pub fn backup_original(&self, set: &AuthFileSet) -> Result<bool, VaultError> {
        if self.exists(&set.tool, ORIGINAL_PROFILE)? {
            return Ok(false);
        }
        if set.present().next().is_none() {
            return Ok(false);
        }
        if self.active_profile(set)?.is_some() {
            return Ok(false);
        }
        self.backup_as(set, ORIGINAL_PROFILE, CreatedBy::FirstActivate)?;
        Ok(true)
    }

    /// Snapshot the live state under `_backup_<YYYYMMDD_HHMMSS>`.
    ///
    /// Returns `None` (not an error) when no required auth file is present.
    pub fn backup_current(&self, set: &AuthFileSet) -> Result<Option<String>, VaultError> {
        if !set.any_required_present() {
            return Ok(None);
        }
        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut n = 0;
        let mut name = auto_backup_name(&stamp, n);
        while self.exists(&set.tool, &name)? {
            n += 1;
            name = auto_backup_name(&stamp, n);
        }
        self.backup_as(set, &name, CreatedBy::Auto)?;
        Ok(Some(name))
    }

    /// Keep at most `max_backups` `_backup_*` profiles, deleting the oldest.
    /// `max_backups == 0` means unlimited. Returns the deleted names.
    pub fn rotate_auto_backups(
        &self,
        tool: &str,
        max_backups: usize,
    ) -> Result<Vec<String>, VaultError> {
        if max_backups == 0 {
            return Ok(Vec::new());
        }
        let mut backups: Vec<String> = self
            .list(tool)?
            .into_iter()
            .filter(|p| p.starts_with(AUTO_BACKUP_PREFIX))
            .collect();
        backups.sort();

        let excess = backups.len().saturating_sub(max_backups);
        let mut deleted = Vec::with_capacity(excess);
        for name in backups.into_iter().take(excess) {
            self.delete_force(tool, &name)?;
            deleted.push(name);
        }
        Ok(deleted)
    }
}

/// Snapshots taken inside the same second get a zero-padded counter so that
/// name order stays creation order, which `rotate_auto_backups` relies on.
fn auto_backup_name(stamp: &str, n: u32) -> String {
    if n == 0 {
        format!("{AUTO_BACKUP_PREFIX}{stamp}")
    } else {
        format!("{AUTO_BACKUP_PREFIX}{stamp}_{n:03}")
    }
}

fn stored_path(dir: &Path, spec: &AuthFileSpec) -> Result<PathBuf, VaultError> {
    let name = spec.file_name().ok_or_else(|| VaultError::InvalidName {
        kind: "auth file",
        name: spec.path.display().to_string(),
        reason: "has no file name",
    })?;
    Ok(dir.join(name))
}

fn list_dirs(dir: &Path) -> Result<Vec<String>, VaultError> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(VaultError::io(dir, e)),
    };
    let mut names = Vec::new();
    for entry in rd {
        let entry = entry.map_err(|e| VaultError::io(dir, e))?;
        let is_dir = entry
            .file_type()
            .map(|t| t.is_dir())
            .map_err(|e| VaultError::io(entry.path(), e))?;
        if !is_dir {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

fn remove_profile_dir(tool: &str, profile: &str, dir: &Path) -> Result<(), VaultError> {
    if !dir.is_dir() {
        return Err(VaultError::NotFound {
            tool: tool.to_string(),
            profile: profile.to_string(),
        });
    }
    fs::remove_dir_all(dir).map_err(|e| VaultError::io(dir, e))
}
