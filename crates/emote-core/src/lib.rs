pub mod aliases;
pub mod buffer;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod injection;
pub mod keyboard;
pub mod matcher;
pub mod models;
pub mod policy;
pub mod settings;
pub mod snapshot;
pub mod storage;

// Re-export common items for convenience
pub use aliases::{is_allowed_alias_char, is_valid_alias, AliasMap, AliasTable, ALIAS_DELIMITER};
pub use buffer::{CharOutcome, TypedBuffer};
pub use config::{get_config_dir, is_daemon_running};
pub use error::{EmoteError, Result};
pub use injection::{
    EnigoInjector, InjectionError, InjectionGuard, InjectionMarker, Injector, INJECTION_MARKER,
};
pub use matcher::{best_match, DEFAULT_MAX_TRIGGER_LENGTH};
pub use models::{AliasEntry, MatchResult, RecentReplacement};
pub use policy::{ContextPolicy, FilterMode};
pub use settings::{load_settings, save_settings, InsertionStrategy, Settings};
pub use snapshot::Snapshot;
pub use storage::{add_alias, remove_alias, AliasSource, JsonAliasStore};
