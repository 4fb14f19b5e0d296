//! mmine - notification extension integrator
//!
//! Adds a notification service extension to an existing iOS application
//! project: creates the extension target, installs its sources, aligns build
//! settings, writes shared info plist values and patches entitlements. Every
//! step is idempotent, so running the integration again on an integrated
//! project leaves every file byte-for-byte unchanged.

pub mod config;
pub mod entitlements;
pub mod error;
pub mod integrator;
pub mod logging;
pub mod paths;
pub mod project;
pub mod report;
pub mod settings;
pub mod templates;

pub use config::{EffectiveConfig, IntegrationConfig};
pub use error::IntegrationError;
pub use integrator::NotificationExtensionIntegrator;
pub use paths::{PathError, PathResolver};
pub use project::{JsonProject, ProjectModel};
pub use report::IntegrationReport;
