use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use acctswap_core::api::{
    atomic_write, CooldownRecord, CooldownStore, HealthStore, ProfileHealth, StoreError, StoreState,
};
use chrono::{DateTime, Duration, Utc};

/// Cooldown and health facts persisted as pretty JSON in one file.
///
/// Every mutation is read-modify-write under a process-local lock and lands
/// via temp file + rename, so readers never observe a torn file.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_health(
        &self,
        tool: &str,
        profile: &str,
        health: ProfileHealth,
    ) -> Result<(), StoreError> {
        self.update(|s| s.set_health(tool, profile, health))
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<StoreState, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreState::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreState::default());
        }
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;
        }
        let bytes = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Decode {
            path: self.path.clone(),
            source,
        })?;
        atomic_write(&self.path, &bytes).map_err(|e| self.io_err(e))
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&self.load()?))
    }

    fn update<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> Result<T, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut state = self.load()?;
        let out = f(&mut state);
        state.prune(Utc::now());
        self.save(&state)?;
        Ok(out)
    }
}

impl CooldownStore for JsonFileStore {
    fn set_cooldown(
        &self,
        tool: &str,
        profile: &str,
        since: DateTime<Utc>,
        duration: Duration,
        note: &str,
    ) -> Result<(), StoreError> {
        self.update(|s| s.set_cooldown(tool, profile, since, duration, note))
    }

    fn active_cooldown(
        &self,
        tool: &str,
        profile: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CooldownRecord>, StoreError> {
        self.read(|s| s.active_cooldown(tool, profile, now))
    }

    fn clear_cooldown(&self, tool: &str, profile: &str) -> Result<usize, StoreError> {
        self.update(|s| s.clear_cooldown(tool, profile))
    }

    fn clear_all(&self, tool: Option<&str>) -> Result<usize, StoreError> {
        self.update(|s| s.clear_all(tool))
    }

    fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<CooldownRecord>, StoreError> {
        self.read(|s| s.list_active(now))
    }
}

impl HealthStore for JsonFileStore {
    fn health(&self, tool: &str, profile: &str) -> Result<Option<ProfileHealth>, StoreError> {
        self.read(|s| s.health(tool, profile))
    }

    fn last_activation(
        &self,
        tool: &str,
        profile: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.read(|s| s.last_activation(tool, profile))
    }

    fn record_activation(
        &self,
        tool: &str,
        profile: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.update(|s| s.record_activation(tool, profile, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctswap_core::api::HealthStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let now = Utc::now();
        {
            let store = JsonFileStore::new(&path);
            store
                .set_cooldown("claude", "work", now, Duration::minutes(60), "auto")
                .unwrap();
            store.record_activation("claude", "home", now).unwrap();
            store
                .set_health(
                    "claude",
                    "home",
                    ProfileHealth {
                        status: HealthStatus::Warning,
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        let store = JsonFileStore::new(&path);
        let cd = store.active_cooldown("claude", "work", now).unwrap().unwrap();
        assert_eq!(cd.notes, "auto");
        assert_eq!(store.last_activation("claude", "home").unwrap(), Some(now));
        assert_eq!(
            store.health("claude", "home").unwrap().unwrap().status,
            HealthStatus::Warning
        );
        assert_eq!(store.list_active(now).unwrap().len(), 1);
        assert_eq!(store.clear_all(Some("claude")).unwrap(), 1);
        assert!(store.list_active(now).unwrap().is_empty());

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_or_empty_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);
        assert!(store.list_active(Utc::now()).unwrap().is_empty());
        fs::write(&path, "\n").unwrap();
        assert_eq!(store.health("codex", "a").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.clear_cooldown("codex", "a"),
            Err(StoreError::Decode { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = JsonFileStore::new(&path);
        store
            .set_cooldown("codex", "work", Utc::now(), Duration::minutes(5), "auto")
            .unwrap();
        store.clear_cooldown("codex", "work").unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
