//! Entitlements resolution and patching
//!
//! Collects the entitlements files assigned to a target's debug and release
//! configurations, lets [`EntitlementsPlan`] decide what to do, then
//! fabricates missing files and patches every file with the app group and
//! the push environment.

mod plan;

pub use plan::{ApsEnvironment, EntitlementsPlan, SidePlan};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use mmine_plist::XmlDictStore;
use tracing::{debug, info};

use crate::error::IntegrationError;
use crate::paths::PathResolver;
use crate::project::{ConfigurationKind, ObjectId, ProjectModel};
use crate::templates::ENTITLEMENTS;

pub const CODE_SIGN_ENTITLEMENTS: &str = "CODE_SIGN_ENTITLEMENTS";
pub const APPLICATION_GROUPS_KEY: &str = "com.apple.security.application-groups";
pub const APS_ENVIRONMENT_KEY: &str = "aps-environment";

const ENTITLEMENTS_FILE_TYPE: &str = "text.plist.entitlements";

/// Configurations of one side and the files they currently point at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Side {
    pub configurations: Vec<ObjectId>,
    pub files: BTreeSet<PathBuf>,
}

/// Entitlements assignment of a target, split by configuration kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub debug: Side,
    pub release: Side,
}

impl Assignment {
    /// Read `CODE_SIGN_ENTITLEMENTS` from every configuration of `target`
    pub fn collect<P: ProjectModel + ?Sized>(
        project: &P,
        target: &ObjectId,
        resolver: &PathResolver,
    ) -> Result<Self, IntegrationError> {
        let mut assignment = Assignment::default();
        for config in project.configurations(target)? {
            let side = match config.kind {
                ConfigurationKind::Debug => &mut assignment.debug,
                ConfigurationKind::Release => &mut assignment.release,
            };
            if let Some(value) = project.resolved_setting(target, &config.id, CODE_SIGN_ENTITLEMENTS)
            {
                side.files.insert(resolver.resolve(&value)?);
            }
            side.configurations.push(config.id);
        }
        Ok(assignment)
    }

    /// A fixed pair of files with no configurations to reassign
    pub fn fixed(
        debug: impl IntoIterator<Item = PathBuf>,
        release: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        Self {
            debug: Side {
                configurations: Vec::new(),
                files: debug.into_iter().collect(),
            },
            release: Side {
                configurations: Vec::new(),
                files: release.into_iter().collect(),
            },
        }
    }

    pub fn plan(&self, target_name: Option<&str>) -> EntitlementsPlan {
        EntitlementsPlan::decide(&self.debug.files, &self.release.files, target_name)
    }
}

/// Files touched while applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementsOutcome {
    pub created: Vec<PathBuf>,
    pub patched: Vec<PathBuf>,
    pub changed: bool,
}

/// Applies an [`EntitlementsPlan`] for one target
pub struct EntitlementsWriter<'a, P: ProjectModel + ?Sized> {
    project: &'a mut P,
    resolver: &'a PathResolver,
    app_group: &'a str,
    outcome: EntitlementsOutcome,
}

impl<'a, P: ProjectModel + ?Sized> EntitlementsWriter<'a, P> {
    pub fn new(project: &'a mut P, resolver: &'a PathResolver, app_group: &'a str) -> Self {
        Self {
            project,
            resolver,
            app_group,
            outcome: EntitlementsOutcome::default(),
        }
    }

    /// Decide and apply for `assignment`
    ///
    /// `target_name` enables fabrication of missing files.
    pub fn apply(
        mut self,
        assignment: &Assignment,
        target_name: Option<&str>,
    ) -> Result<EntitlementsOutcome, IntegrationError> {
        let plan = assignment.plan(target_name);
        debug!(?plan, "entitlements plan");

        match plan {
            EntitlementsPlan::Nothing => {
                info!("no entitlements assigned and none to create");
            }
            EntitlementsPlan::CreateShared { file_name } => {
                let configurations: Vec<ObjectId> = assignment
                    .debug
                    .configurations
                    .iter()
                    .chain(&assignment.release.configurations)
                    .cloned()
                    .collect();
                let path = self.fabricate(&file_name, &configurations)?;
                self.patch(&path, ApsEnvironment::Development)?;
            }
            EntitlementsPlan::PatchShared { files } => {
                for path in &files {
                    self.patch(path, ApsEnvironment::Development)?;
                }
            }
            EntitlementsPlan::Split { debug, release } => {
                self.apply_side(debug, &assignment.debug, ApsEnvironment::Development)?;
                self.apply_side(release, &assignment.release, ApsEnvironment::Production)?;
            }
        }

        Ok(self.outcome)
    }

    fn apply_side(
        &mut self,
        plan: SidePlan,
        side: &Side,
        environment: ApsEnvironment,
    ) -> Result<(), IntegrationError> {
        match plan {
            SidePlan::Patch(files) => {
                for path in &files {
                    self.patch(path, environment)?;
                }
            }
            SidePlan::Fabricate { file_name } => {
                let path = self.fabricate(&file_name, &side.configurations)?;
                self.patch(&path, environment)?;
            }
            SidePlan::Skip => {
                info!(%environment, "no entitlements file for this side, skipping");
            }
        }
        Ok(())
    }

    /// Install the template in the project directory and point `configurations` at it
    fn fabricate(
        &mut self,
        file_name: &str,
        configurations: &[ObjectId],
    ) -> Result<PathBuf, IntegrationError> {
        let path = self.resolver.project_dir().join(file_name);
        if ENTITLEMENTS
            .install(&path)
            .map_err(|e| IntegrationError::io("write entitlements", &path, e))?
        {
            info!(path = %path.display(), "created entitlements file");
            self.outcome.created.push(path.clone());
            self.outcome.changed = true;
        } else {
            info!(path = %path.display(), "entitlements file already exists");
        }

        let group = self.project.main_group();
        self.project
            .add_file_reference(&group, &path, Some(ENTITLEMENTS_FILE_TYPE))?;

        let value = self.resolver.to_project_relative(&path);
        for config in configurations {
            if self
                .project
                .set_setting(config, CODE_SIGN_ENTITLEMENTS, &value)?
            {
                self.outcome.changed = true;
            }
        }
        Ok(path)
    }

    fn patch(&mut self, path: &Path, environment: ApsEnvironment) -> Result<(), IntegrationError> {
        info!(path = %path.display(), %environment, "writing entitlements");
        let group = XmlDictStore::add_array_element(path, APPLICATION_GROUPS_KEY, self.app_group)?;
        let aps = XmlDictStore::set_string(path, APS_ENVIRONMENT_KEY, environment.as_str())?;
        if group.changed() || aps.changed() {
            self.outcome.changed = true;
        }
        if !self.outcome.patched.iter().any(|p| p == path) {
            self.outcome.patched.push(path.to_path_buf());
        }
        Ok(())
    }
}
