//! File-backed project model
//!
//! Reads and writes the project graph as JSON. Settings live in ordered maps
//! and every collection keeps insertion order, so saving an unchanged model
//! produces identical bytes.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::model::{
    BuildConfiguration, BuildPhase, ConfigurationKind, FileReference, Group, ObjectId, PhaseSpec,
    ProjectDocument, Target,
};
use super::{ConfigurationRef, ProjectError, ProjectModel, APP_EXTENSION_PRODUCT_TYPE};
use crate::config::deep_merge;

const PRODUCTS_GROUP: &str = "Products";

/// JSON serialized project graph bound to its file
#[derive(Debug, Clone)]
pub struct JsonProject {
    path: PathBuf,
    project_dir: PathBuf,
    project_name: String,
    document: ProjectDocument,
}

impl JsonProject {
    /// Load a project model from disk
    pub fn open(path: &Path) -> Result<Self, ProjectError> {
        let contents = fs::read_to_string(path).map_err(|source| ProjectError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ProjectDocument =
            serde_json::from_str(&contents).map_err(|source| ProjectError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_document(path, document))
    }

    /// Bind an in-memory document to a file path
    pub fn from_document(path: &Path, document: ProjectDocument) -> Self {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let project_dir = if parent.is_absolute() {
            parent.to_path_buf()
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(parent))
                .unwrap_or_else(|_| parent.to_path_buf())
        };
        let project_name = document.name.clone().unwrap_or_else(|| stem_name(path));

        Self {
            path: path.to_path_buf(),
            project_dir,
            project_name,
            document,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &ProjectDocument {
        &self.document
    }

    fn target(&self, id: &ObjectId) -> Result<&Target, ProjectError> {
        self.document
            .targets
            .iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| unknown("target", id))
    }

    fn target_mut(&mut self, id: &ObjectId) -> Result<&mut Target, ProjectError> {
        self.document
            .targets
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| unknown("target", id))
    }

    fn configuration(&self, id: &ObjectId) -> Option<&BuildConfiguration> {
        self.document
            .targets
            .iter()
            .flat_map(|t| t.build_configurations.iter())
            .chain(self.document.build_configurations.iter())
            .find(|c| &c.id == id)
    }

    fn configuration_mut(&mut self, id: &ObjectId) -> Option<&mut BuildConfiguration> {
        self.document
            .targets
            .iter_mut()
            .flat_map(|t| t.build_configurations.iter_mut())
            .chain(self.document.build_configurations.iter_mut())
            .find(|c| &c.id == id)
    }

    fn group_mut(&mut self, id: &ObjectId) -> Result<&mut Group, ProjectError> {
        self.document
            .groups
            .iter_mut()
            .find(|g| &g.id == id)
            .ok_or_else(|| unknown("group", id))
    }

    fn file_reference(&self, id: &ObjectId) -> Option<&FileReference> {
        self.document.file_references.iter().find(|f| &f.id == id)
    }

    /// Path as stored in the model: relative to the project directory when inside it
    fn stored_path(&self, path: &Path) -> String {
        match path.strip_prefix(&self.project_dir) {
            Ok(rest) => rest.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }

    fn ensure_group_child(&mut self, group: &ObjectId, child: &ObjectId) -> Result<(), ProjectError> {
        let group = self.group_mut(group)?;
        if !group.children.contains(child) {
            group.children.push(child.clone());
        }
        Ok(())
    }

    fn extension_configurations(&self) -> Vec<(String, ConfigurationKind)> {
        if self.document.build_configurations.is_empty() {
            vec![
                ("Debug".to_string(), ConfigurationKind::Debug),
                ("Release".to_string(), ConfigurationKind::Release),
            ]
        } else {
            self.document
                .build_configurations
                .iter()
                .map(|c| (c.name.clone(), c.kind()))
                .collect()
        }
    }
}

fn unknown(kind: &'static str, id: &ObjectId) -> ProjectError {
    ProjectError::UnknownObject {
        kind,
        id: id.clone(),
    }
}

/// `App` for `/x/App.xcodeproj.json`
fn stem_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .and_then(|name| name.split('.').next().map(str::to_string))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "Project".to_string())
}

fn extension_settings(kind: ConfigurationKind) -> BTreeMap<String, String> {
    let mut settings = BTreeMap::new();
    let mut set = |key: &str, value: &str| {
        settings.insert(key.to_string(), value.to_string());
    };
    set("CODE_SIGN_STYLE", "Automatic");
    set(
        "LD_RUNPATH_SEARCH_PATHS",
        "$(inherited) @executable_path/Frameworks @executable_path/../../Frameworks",
    );
    set("SDKROOT", "iphoneos");
    set("SKIP_INSTALL", "YES");
    set("TARGETED_DEVICE_FAMILY", "1,2");
    match kind {
        ConfigurationKind::Debug => {
            set("SWIFT_ACTIVE_COMPILATION_CONDITIONS", "DEBUG");
            set("SWIFT_OPTIMIZATION_LEVEL", "-Onone");
        }
        ConfigurationKind::Release => {
            set("SWIFT_OPTIMIZATION_LEVEL", "-O");
            set("VALIDATE_PRODUCT", "YES");
        }
    }
    settings
}

impl ProjectModel for JsonProject {
    fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    fn project_name(&self) -> &str {
        &self.project_name
    }

    fn find_target(&self, name: &str) -> Option<ObjectId> {
        self.document
            .targets
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.id.clone())
    }

    fn create_app_extension_target(&mut self, name: &str) -> Result<ObjectId, ProjectError> {
        let products_group = match self
            .document
            .groups
            .iter()
            .find(|g| g.name.as_deref() == Some(PRODUCTS_GROUP))
        {
            Some(group) => group.id.clone(),
            None => {
                let group = Group {
                    id: ObjectId::generate(),
                    name: Some(PRODUCTS_GROUP.to_string()),
                    path: None,
                    children: Vec::new(),
                };
                let id = group.id.clone();
                self.document.groups.push(group);
                let main_group = self.main_group();
                self.ensure_group_child(&main_group, &id)?;
                id
            }
        };

        let product = FileReference {
            id: ObjectId::generate(),
            path: format!("{}.appex", name),
            last_known_file_type: Some("wrapper.app-extension".to_string()),
        };
        let product_id = product.id.clone();
        self.document.file_references.push(product);
        self.ensure_group_child(&products_group, &product_id)?;

        let build_configurations = self
            .extension_configurations()
            .into_iter()
            .map(|(config_name, kind)| {
                let mut config = BuildConfiguration::new(config_name, kind);
                config.build_settings = extension_settings(kind);
                config
            })
            .collect();

        let target = Target {
            id: ObjectId::generate(),
            name: name.to_string(),
            product_type: APP_EXTENSION_PRODUCT_TYPE.to_string(),
            product_reference: Some(product_id),
            build_configurations,
            build_phases: vec![PhaseSpec::Sources.create(), PhaseSpec::Frameworks.create()],
            dependencies: Vec::new(),
        };
        let id = target.id.clone();
        debug!(target = name, id = %id, "created app extension target");
        self.document.targets.push(target);
        Ok(id)
    }

    fn configurations(&self, target: &ObjectId) -> Result<Vec<ConfigurationRef>, ProjectError> {
        Ok(self
            .target(target)?
            .build_configurations
            .iter()
            .map(|c| ConfigurationRef {
                id: c.id.clone(),
                name: c.name.clone(),
                kind: c.kind(),
            })
            .collect())
    }

    fn setting(&self, configuration: &ObjectId, key: &str) -> Option<String> {
        self.configuration(configuration)?
            .build_settings
            .get(key)
            .cloned()
    }

    fn resolved_setting(
        &self,
        target: &ObjectId,
        configuration: &ObjectId,
        key: &str,
    ) -> Option<String> {
        if let Some(value) = self.setting(configuration, key) {
            return Some(value);
        }
        // Fall back to the project-level configuration of the same name
        let target = self.target(target).ok()?;
        let name = &target
            .build_configurations
            .iter()
            .find(|c| &c.id == configuration)?
            .name;
        self.document
            .build_configurations
            .iter()
            .find(|c| &c.name == name)?
            .build_settings
            .get(key)
            .cloned()
    }

    fn set_setting(
        &mut self,
        configuration: &ObjectId,
        key: &str,
        value: &str,
    ) -> Result<bool, ProjectError> {
        let config = self
            .configuration_mut(configuration)
            .ok_or_else(|| unknown("build configuration", configuration))?;
        if config.build_settings.get(key).map(String::as_str) == Some(value) {
            return Ok(false);
        }
        config
            .build_settings
            .insert(key.to_string(), value.to_string());
        Ok(true)
    }

    fn main_group(&self) -> ObjectId {
        self.document.main_group.clone()
    }

    fn ensure_group(&mut self, name: &str, path: &Path) -> Result<ObjectId, ProjectError> {
        if let Some(group) = self
            .document
            .groups
            .iter()
            .find(|g| g.name.as_deref() == Some(name))
        {
            return Ok(group.id.clone());
        }

        let group = Group {
            id: ObjectId::generate(),
            name: Some(name.to_string()),
            path: Some(self.stored_path(path)),
            children: Vec::new(),
        };
        let id = group.id.clone();
        self.document.groups.push(group);
        let main_group = self.main_group();
        self.ensure_group_child(&main_group, &id)?;
        debug!(group = name, id = %id, "created group");
        Ok(id)
    }

    fn add_file_reference(
        &mut self,
        group: &ObjectId,
        path: &Path,
        file_type: Option<&str>,
    ) -> Result<ObjectId, ProjectError> {
        let stored = self.stored_path(path);
        let id = match self
            .document
            .file_references
            .iter()
            .find(|f| f.path == stored)
        {
            Some(existing) => existing.id.clone(),
            None => {
                let reference = FileReference {
                    id: ObjectId::generate(),
                    path: stored,
                    last_known_file_type: file_type.map(str::to_string),
                };
                let id = reference.id.clone();
                self.document.file_references.push(reference);
                id
            }
        };
        self.ensure_group_child(group, &id)?;
        Ok(id)
    }

    fn product_reference(&self, target: &ObjectId) -> Option<ObjectId> {
        self.target(target).ok()?.product_reference.clone()
    }

    fn find_phase_file(
        &self,
        target: &ObjectId,
        phase: &PhaseSpec,
        file_name: &str,
    ) -> Option<ObjectId> {
        self.target(target)
            .ok()?
            .build_phases
            .iter()
            .filter(|p| phase.matches(p))
            .flat_map(|p| p.files().iter())
            .find(|id| {
                self.file_reference(id)
                    .map(|f| f.file_name() == file_name)
                    .unwrap_or(false)
            })
            .cloned()
    }

    fn phase_contains(&self, target: &ObjectId, phase: &PhaseSpec, file: &ObjectId) -> bool {
        self.target(target)
            .map(|t| {
                t.build_phases
                    .iter()
                    .filter(|p| phase.matches(p))
                    .any(|p| p.files().contains(file))
            })
            .unwrap_or(false)
    }

    fn add_to_phase(
        &mut self,
        target: &ObjectId,
        phase: &PhaseSpec,
        file: &ObjectId,
    ) -> Result<(), ProjectError> {
        let target = self.target_mut(target)?;
        let index = match target.build_phases.iter().position(|p| phase.matches(p)) {
            Some(index) => index,
            None => {
                target.build_phases.push(phase.create());
                target.build_phases.len() - 1
            }
        };
        if let Some(files) = target.build_phases[index].files_mut() {
            if !files.contains(file) {
                files.push(file.clone());
            }
        }
        Ok(())
    }

    fn remove_from_phase(
        &mut self,
        target: &ObjectId,
        phase: &PhaseSpec,
        file: &ObjectId,
    ) -> Result<bool, ProjectError> {
        let target = self.target_mut(target)?;
        let mut removed = false;
        for build_phase in target.build_phases.iter_mut().filter(|p| phase.matches(p)) {
            if let Some(files) = build_phase.files_mut() {
                let before = files.len();
                files.retain(|f| f != file);
                removed |= files.len() != before;
            }
        }
        if removed {
            target
                .build_phases
                .retain(|p| !(phase.matches(p) && p.files().is_empty()));
        }
        Ok(removed)
    }

    fn ensure_shell_script_phase(
        &mut self,
        target: &ObjectId,
        name: &str,
        script: &str,
        input_paths: &[String],
    ) -> Result<bool, ProjectError> {
        let target = self.target_mut(target)?;
        let existing = target.build_phases.iter_mut().find(|p| {
            matches!(p, BuildPhase::ShellScript { shell_script, .. } if shell_script.contains(script))
        });

        match existing {
            Some(BuildPhase::ShellScript {
                input_paths: existing_inputs,
                ..
            }) => {
                let mut changed = false;
                for input in input_paths {
                    if !existing_inputs.contains(input) {
                        existing_inputs.push(input.clone());
                        changed = true;
                    }
                }
                Ok(changed)
            }
            _ => {
                target.build_phases.push(BuildPhase::ShellScript {
                    id: ObjectId::generate(),
                    name: name.to_string(),
                    shell_script: script.to_string(),
                    input_paths: input_paths.to_vec(),
                });
                Ok(true)
            }
        }
    }

    fn has_dependency(&self, target: &ObjectId, on: &ObjectId) -> bool {
        self.target(target)
            .map(|t| t.dependencies.contains(on))
            .unwrap_or(false)
    }

    fn add_dependency(&mut self, target: &ObjectId, on: &ObjectId) -> Result<(), ProjectError> {
        self.target(on)?;
        let target = self.target_mut(target)?;
        if !target.dependencies.contains(on) {
            target.dependencies.push(on.clone());
        }
        Ok(())
    }

    fn merge_target_attributes(
        &mut self,
        target: &ObjectId,
        attributes: Value,
    ) -> Result<bool, ProjectError> {
        self.target(target)?;
        if !self.document.attributes.is_object() {
            self.document.attributes = Value::Object(serde_json::Map::new());
        }
        let root = &mut self.document.attributes;
        let target_attributes = root
            .as_object_mut()
            .map(|map| {
                map.entry("TargetAttributes")
                    .or_insert_with(|| Value::Object(serde_json::Map::new()))
            })
            .ok_or_else(|| unknown("attributes", target))?;
        if !target_attributes.is_object() {
            *target_attributes = Value::Object(serde_json::Map::new());
        }

        let current = target_attributes
            .get(target.as_str())
            .cloned()
            .unwrap_or(Value::Null);
        let merged = deep_merge(current.clone(), attributes);
        if merged == current {
            return Ok(false);
        }
        if let Some(map) = target_attributes.as_object_mut() {
            map.insert(target.to_string(), merged);
        }
        Ok(true)
    }

    fn save(&self) -> Result<(), ProjectError> {
        let mut json =
            serde_json::to_string_pretty(&self.document).map_err(ProjectError::Serialize)?;
        json.push('\n');
        fs::write(&self.path, json).map_err(|source| ProjectError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
