//! Host project model
//!
//! The integrator never walks the project graph itself; every lookup and
//! mutation goes through [`ProjectModel`]. [`JsonProject`] is the file-backed
//! implementation used by the CLI and the tests.

mod json;
mod model;

pub use json::JsonProject;
pub use model::{
    BuildConfiguration, BuildPhase, ConfigurationKind, CopyDestination, FileReference, Group,
    ObjectId, PhaseSpec, ProjectDocument, Target,
};

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;

/// Product type of app extension targets
pub const APP_EXTENSION_PRODUCT_TYPE: &str = "com.apple.product-type.app-extension";

/// Project model errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Failed to read project {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write project {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid project model {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize project model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Unknown {kind} {id}")]
    UnknownObject { kind: &'static str, id: ObjectId },
}

/// A configuration of a target, as seen through the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationRef {
    pub id: ObjectId,
    pub name: String,
    pub kind: ConfigurationKind,
}

/// Operations the integrator needs from the host project
pub trait ProjectModel {
    /// Directory containing the project file
    fn project_dir(&self) -> &Path;

    /// Project name, as substituted for `$(PROJECT_NAME)`
    fn project_name(&self) -> &str;

    /// Find a native target by name
    fn find_target(&self, name: &str) -> Option<ObjectId>;

    /// Create an app extension target with one configuration per project configuration
    fn create_app_extension_target(&mut self, name: &str) -> Result<ObjectId, ProjectError>;

    /// Configurations of a target, in declaration order
    fn configurations(&self, target: &ObjectId) -> Result<Vec<ConfigurationRef>, ProjectError>;

    /// Raw value of a setting on one configuration
    fn setting(&self, configuration: &ObjectId, key: &str) -> Option<String>;

    /// Value of a setting after inheritance
    ///
    /// Models without inheritance fall back to the raw value.
    fn resolved_setting(
        &self,
        target: &ObjectId,
        configuration: &ObjectId,
        key: &str,
    ) -> Option<String> {
        let _ = target;
        self.setting(configuration, key)
    }

    /// Set a setting, returning whether the value changed
    fn set_setting(
        &mut self,
        configuration: &ObjectId,
        key: &str,
        value: &str,
    ) -> Result<bool, ProjectError>;

    fn main_group(&self) -> ObjectId;

    /// Find a group by name, creating it under the main group if needed
    fn ensure_group(&mut self, name: &str, path: &Path) -> Result<ObjectId, ProjectError>;

    /// Register a file in a group; returns the existing reference for a known path
    fn add_file_reference(
        &mut self,
        group: &ObjectId,
        path: &Path,
        file_type: Option<&str>,
    ) -> Result<ObjectId, ProjectError>;

    /// The product file a target builds
    fn product_reference(&self, target: &ObjectId) -> Option<ObjectId>;

    /// First file in a target phase whose file name equals `file_name`
    fn find_phase_file(&self, target: &ObjectId, phase: &PhaseSpec, file_name: &str)
        -> Option<ObjectId>;

    fn phase_contains(&self, target: &ObjectId, phase: &PhaseSpec, file: &ObjectId) -> bool;

    /// Add a file to a phase, creating the phase if the target lacks it
    fn add_to_phase(
        &mut self,
        target: &ObjectId,
        phase: &PhaseSpec,
        file: &ObjectId,
    ) -> Result<(), ProjectError>;

    /// Remove a file from a phase; phases left empty are removed too
    fn remove_from_phase(
        &mut self,
        target: &ObjectId,
        phase: &PhaseSpec,
        file: &ObjectId,
    ) -> Result<bool, ProjectError>;

    /// Create or update a shell script phase so it holds `script` and all `input_paths`
    fn ensure_shell_script_phase(
        &mut self,
        target: &ObjectId,
        name: &str,
        script: &str,
        input_paths: &[String],
    ) -> Result<bool, ProjectError>;

    fn has_dependency(&self, target: &ObjectId, on: &ObjectId) -> bool;

    fn add_dependency(&mut self, target: &ObjectId, on: &ObjectId) -> Result<(), ProjectError>;

    /// Deep-merge `attributes` into the target's `TargetAttributes` entry
    fn merge_target_attributes(
        &mut self,
        target: &ObjectId,
        attributes: Value,
    ) -> Result<bool, ProjectError>;

    /// Persist the model
    fn save(&self) -> Result<(), ProjectError>;
}
