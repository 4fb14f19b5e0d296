//! Project graph entities
//!
//! Objects reference each other through [`ObjectId`]s instead of pointers.
//! The serialized form is what [`super::JsonProject`] reads and writes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Xcode-style 24 hex character object identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
        Self(uuid[..24].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build configuration type used to select configuration groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationKind {
    Debug,
    Release,
}

impl ConfigurationKind {
    /// Classify a configuration without an explicit kind
    ///
    /// Debug when the preprocessor defines `DEBUG=1` or the Swift active
    /// compilation conditions include `DEBUG`, otherwise by name.
    pub fn classify(name: &str, settings: &BTreeMap<String, String>) -> Self {
        let defines_debug = settings
            .get("GCC_PREPROCESSOR_DEFINITIONS")
            .map(|value| value.split_whitespace().any(|d| d == "DEBUG=1"))
            .unwrap_or(false);
        let swift_debug = settings
            .get("SWIFT_ACTIVE_COMPILATION_CONDITIONS")
            .map(|value| value.split_whitespace().any(|d| d == "DEBUG"))
            .unwrap_or(false);

        if defines_debug || swift_debug || name.to_lowercase().contains("debug") {
            ConfigurationKind::Debug
        } else {
            ConfigurationKind::Release
        }
    }
}

impl fmt::Display for ConfigurationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationKind::Debug => f.write_str("debug"),
            ConfigurationKind::Release => f.write_str("release"),
        }
    }
}

/// A named set of build settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub id: ObjectId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConfigurationKind>,
    #[serde(default)]
    pub build_settings: BTreeMap<String, String>,
}

impl BuildConfiguration {
    pub fn new(name: impl Into<String>, kind: ConfigurationKind) -> Self {
        Self {
            id: ObjectId::generate(),
            name: name.into(),
            kind: Some(kind),
            build_settings: BTreeMap::new(),
        }
    }

    /// Explicit kind, or the classified one
    pub fn kind(&self) -> ConfigurationKind {
        self.kind
            .unwrap_or_else(|| ConfigurationKind::classify(&self.name, &self.build_settings))
    }
}

/// Copy-files phase destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyDestination {
    Frameworks,
    PlugIns,
}

/// A target build phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "isa")]
pub enum BuildPhase {
    #[serde(rename = "PBXSourcesBuildPhase")]
    Sources {
        id: ObjectId,
        #[serde(default)]
        files: Vec<ObjectId>,
    },
    #[serde(rename = "PBXFrameworksBuildPhase")]
    Frameworks {
        id: ObjectId,
        #[serde(default)]
        files: Vec<ObjectId>,
    },
    #[serde(rename = "PBXCopyFilesBuildPhase")]
    CopyFiles {
        id: ObjectId,
        name: String,
        destination: CopyDestination,
        #[serde(default)]
        files: Vec<ObjectId>,
    },
    #[serde(rename = "PBXShellScriptBuildPhase")]
    ShellScript {
        id: ObjectId,
        name: String,
        shell_script: String,
        #[serde(default)]
        input_paths: Vec<String>,
    },
}

impl BuildPhase {
    pub fn files(&self) -> &[ObjectId] {
        match self {
            BuildPhase::Sources { files, .. }
            | BuildPhase::Frameworks { files, .. }
            | BuildPhase::CopyFiles { files, .. } => files,
            BuildPhase::ShellScript { .. } => &[],
        }
    }

    pub fn files_mut(&mut self) -> Option<&mut Vec<ObjectId>> {
        match self {
            BuildPhase::Sources { files, .. }
            | BuildPhase::Frameworks { files, .. }
            | BuildPhase::CopyFiles { files, .. } => Some(files),
            BuildPhase::ShellScript { .. } => None,
        }
    }
}

/// Selects one build phase of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseSpec {
    Sources,
    Frameworks,
    CopyFiles {
        name: String,
        destination: CopyDestination,
    },
}

impl PhaseSpec {
    pub fn copy_files(name: impl Into<String>, destination: CopyDestination) -> Self {
        PhaseSpec::CopyFiles {
            name: name.into(),
            destination,
        }
    }

    /// Whether `phase` is the phase this spec selects
    pub fn matches(&self, phase: &BuildPhase) -> bool {
        match (self, phase) {
            (PhaseSpec::Sources, BuildPhase::Sources { .. }) => true,
            (PhaseSpec::Frameworks, BuildPhase::Frameworks { .. }) => true,
            (PhaseSpec::CopyFiles { name, .. }, BuildPhase::CopyFiles { name: other, .. }) => {
                name == other
            }
            _ => false,
        }
    }

    /// An empty phase matching this spec
    pub fn create(&self) -> BuildPhase {
        let id = ObjectId::generate();
        match self {
            PhaseSpec::Sources => BuildPhase::Sources { id, files: Vec::new() },
            PhaseSpec::Frameworks => BuildPhase::Frameworks { id, files: Vec::new() },
            PhaseSpec::CopyFiles { name, destination } => BuildPhase::CopyFiles {
                id,
                name: name.clone(),
                destination: *destination,
                files: Vec::new(),
            },
        }
    }
}

impl fmt::Display for PhaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseSpec::Sources => f.write_str("Sources"),
            PhaseSpec::Frameworks => f.write_str("Frameworks"),
            PhaseSpec::CopyFiles { name, .. } => f.write_str(name),
        }
    }
}

/// A native build target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: ObjectId,
    pub name: String,
    pub product_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_reference: Option<ObjectId>,
    pub build_configurations: Vec<BuildConfiguration>,
    #[serde(default)]
    pub build_phases: Vec<BuildPhase>,
    #[serde(default)]
    pub dependencies: Vec<ObjectId>,
}

/// A file known to the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReference {
    pub id: ObjectId,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_known_file_type: Option<String>,
}

impl FileReference {
    /// Last path component
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A navigator group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub children: Vec<ObjectId>,
}

/// The whole project graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub main_group: ObjectId,
    /// Project-level configurations, inherited by targets
    #[serde(default)]
    pub build_configurations: Vec<BuildConfiguration>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub file_references: Vec<FileReference>,
    /// Root object attributes (`TargetAttributes` and friends)
    #[serde(default = "empty_object")]
    pub attributes: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
