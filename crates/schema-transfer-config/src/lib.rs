pub mod config;
pub mod preferences;

pub use config::{
    AppConfig, ConfigError, InstanceRecord, SyncSettings, CONFIG_ENV_VAR,
    DEFAULT_ACTIVITIES_PER_REQUEST,
};
pub use preferences::{PreferenceStore, Preferences};
