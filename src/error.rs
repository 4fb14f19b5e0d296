//! Integration error type

use std::io;
use std::path::PathBuf;

use mmine_plist::PlistError;

use crate::config::ConfigError;
use crate::paths::{PathError, SUPPORTED_VARIABLES};
use crate::project::ProjectError;

/// Errors that stop an integration run
#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Plist(#[from] PlistError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Target '{0}' not found in project")]
    TargetNotFound(String),
}

impl IntegrationError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        IntegrationError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Guidance printed after the diagnostic
    pub fn remediation(&self) -> Option<String> {
        match self {
            IntegrationError::Path(PathError::UnresolvedVariable { .. }) => Some(format!(
                "Rewrite the build setting so it only uses {} (or a plain relative/absolute path), then re-run; \
                 files already updated are left in a consistent state.",
                SUPPORTED_VARIABLES.join(" or ")
            )),
            IntegrationError::TargetNotFound(_) => {
                Some("Pass the application target name with --target.".to_string())
            }
            IntegrationError::Config(_) => {
                Some("Check the command line flags and the .mmine.toml file.".to_string())
            }
            IntegrationError::Plist(e) => Some(format!(
                "Make sure {} is a valid property list with a top-level <dict>.",
                e.path().display()
            )),
            _ => None,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            IntegrationError::Config(_) => 2,
            _ => 1,
        }
    }
}
