//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `acctswap_core::api` instead of reaching into internal modules.

pub use crate::config::{
    AppConfig, BackupConfig, HandoffSettings, LoggingConfig, NotifyConfig, NotifySink,
    RotationConfig,
};
pub use crate::error::{
    ConfigError, HandoffError, PtyError, SelectError, StoreError, VaultError,
};
pub use crate::handoff::{
    HandoffConfig, HandoffController, HandoffDeps, HandoffState, LoginHandler, Notifier,
    NotifyAction, NotifyLevel, Outcome, PtyController, SessionRecord,
};
pub use crate::provider::{AuthFileSet, AuthFileSpec, Tool, UnknownTool};
pub use crate::ratelimit::{RateLimitDetector, StreamDetector};
pub use crate::rotation::{
    format_duration, Algorithm, ProfileScore, RotationSelector, ScoreReason, SelectionResult,
    UsageInfo,
};
pub use crate::store::{
    CooldownRecord, CooldownStore, HealthStatus, HealthStore, MemoryStore, ProfileHealth,
    StoreState,
};
pub use crate::vault::{
    activate, atomic_write, is_system_profile, ActivateOptions, ActivationReport, CreatedBy, ProfileEntry,
    ProfileKind, ProfileMeta, Vault, AUTO_BACKUP_PREFIX, ORIGINAL_PROFILE,
};
