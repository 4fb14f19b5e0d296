//! Configuration merge system
//!
//! Implements the 3-layer configuration merge:
//! 1. Built-in defaults
//! 2. Config file (`.mmine.toml` next to the project, or `--config`)
//! 3. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, ExtensionConfig, IntegrationConfig,
    CONFIG_FILE_NAME,
};
pub use merge::{deep_merge, merge_layers};
