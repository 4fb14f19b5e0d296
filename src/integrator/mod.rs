//! Notification extension integration
//!
//! [`NotificationExtensionIntegrator`] runs a fixed sequence of idempotent
//! steps against a host project. Each step queries the current state before
//! writing, so re-running on an integrated project changes nothing. The
//! project model is persisted once, at the end.

mod cordova;

use std::fs;
use std::path::{Path, PathBuf};

use mmine_plist::XmlDictStore;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::IntegrationConfig;
use crate::entitlements::{Assignment, EntitlementsWriter};
use crate::error::IntegrationError;
use crate::paths::PathResolver;
use crate::project::{ConfigurationKind, CopyDestination, ObjectId, PhaseSpec, ProjectModel};
use crate::report::IntegrationReport;
use crate::settings::{BuildSettingsAligner, Composition, ConfigurationSelector, INFOPLIST_FILE};
use crate::templates::{
    Template, APPLICATION_CODE_PLACEHOLDER, EXTENSION_INFO_PLIST, EXTENSION_SOURCE,
};

pub const APPLICATION_CODE_KEY: &str = "com.mobilemessaging.app_code";
pub const APP_GROUP_KEY: &str = "com.mobilemessaging.app_group";
pub const BACKGROUND_MODES_KEY: &str = "UIBackgroundModes";
pub const REMOTE_NOTIFICATION_MODE: &str = "remote-notification";

const SHORT_VERSION_KEY: &str = "CFBundleShortVersionString";
const BUNDLE_VERSION_KEY: &str = "CFBundleVersion";
const EMBED_APP_EXTENSIONS: &str = "Embed App Extensions";

const APPLICATION_GROUPS_CAPABILITY: &str = "com.apple.ApplicationGroups.iOS";
const PUSH_CAPABILITY: &str = "com.apple.Push";
const BACKGROUND_MODES_CAPABILITY: &str = "com.apple.BackgroundModes";

/// Integrates the notification service extension into a host project
pub struct NotificationExtensionIntegrator<P: ProjectModel> {
    project: P,
    config: IntegrationConfig,
    resolver: PathResolver,
    main_target: ObjectId,
}

impl<P: ProjectModel> NotificationExtensionIntegrator<P> {
    /// Bind the integrator to a project, failing if the main target is unknown
    pub fn new(project: P, config: IntegrationConfig) -> Result<Self, IntegrationError> {
        let main_target = project
            .find_target(&config.main_target)
            .ok_or_else(|| IntegrationError::TargetNotFound(config.main_target.clone()))?;
        let resolver = PathResolver::new(project.project_dir(), project.project_name());
        Ok(Self {
            project,
            config,
            resolver,
            main_target,
        })
    }

    /// Run every step and persist the project model
    pub fn run(&mut self) -> Result<IntegrationReport, IntegrationError> {
        let mut report = IntegrationReport::new(
            &self.config.main_target,
            &self.config.extension.target_name,
            self.config.cordova,
        );
        info!(
            main_target = %self.config.main_target,
            extension = %self.config.extension.target_name,
            project_dir = %self.resolver.project_dir().display(),
            cordova = self.config.cordova,
            "starting notification extension integration"
        );

        let extension = self.acquire_extension_target(&mut report)?;
        let source = self.install_extension_files(&extension, &mut report)?;
        self.inject_application_code(&source, &mut report)?;
        self.align_basic_settings(&extension, &mut report)?;
        self.write_shared_plist_values(&mut report)?;
        self.merge_capabilities(&extension, &mut report)?;
        self.embed_extension(&extension, &mut report)?;
        self.setup_product_settings(&extension, &mut report)?;
        if self.config.cordova {
            self.run_cordova_steps(&extension, &mut report)?;
        }
        self.setup_entitlements(&extension, &mut report)?;

        self.project.save()?;
        let report = report.finish();
        info!("{}", report.human_summary);
        Ok(report)
    }

    fn extension_dir(&self) -> PathBuf {
        self.resolver
            .project_dir()
            .join(&self.config.extension.directory)
    }

    fn extension_info_plist(&self) -> PathBuf {
        self.extension_dir().join(EXTENSION_INFO_PLIST.file_name)
    }

    fn acquire_extension_target(
        &mut self,
        report: &mut IntegrationReport,
    ) -> Result<ObjectId, IntegrationError> {
        let name = self.config.extension.target_name.clone();
        if let Some(id) = self.project.find_target(&name) {
            info!(target = %name, "notification extension target already exists, reusing");
            report.record("extension target", false);
            return Ok(id);
        }

        info!(target = %name, "creating notification extension target");
        let id = self.project.create_app_extension_target(&name)?;
        report.record("extension target", true);
        Ok(id)
    }

    /// Install the source and info plist templates and register them
    ///
    /// Returns the path of the extension source file.
    fn install_extension_files(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<PathBuf, IntegrationError> {
        let dir = self.extension_dir();
        let mut changed = false;

        if dir.is_dir() {
            info!(path = %dir.display(), "extension directory already exists");
        } else {
            info!(path = %dir.display(), "creating extension directory");
            fs::create_dir_all(&dir)
                .map_err(|e| IntegrationError::io("create directory", &dir, e))?;
            changed = true;
        }

        let group = self
            .project
            .ensure_group(&self.config.extension.group, &dir)?;

        let source = dir.join(EXTENSION_SOURCE.file_name);
        changed |= install(&EXTENSION_SOURCE, &source)?;
        let source_ref = self
            .project
            .add_file_reference(&group, &source, Some("sourcecode.swift"))?;
        if !self
            .project
            .phase_contains(extension, &PhaseSpec::Sources, &source_ref)
        {
            self.project
                .add_to_phase(extension, &PhaseSpec::Sources, &source_ref)?;
            changed = true;
        }

        let plist = self.extension_info_plist();
        changed |= install(&EXTENSION_INFO_PLIST, &plist)?;
        self.project
            .add_file_reference(&group, &plist, Some("text.plist.xml"))?;

        report.record("extension files", changed);
        Ok(source)
    }

    fn inject_application_code(
        &mut self,
        source: &Path,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let text = fs::read_to_string(source)
            .map_err(|e| IntegrationError::io("read", source, e))?;
        let replaced = text.replacen(
            APPLICATION_CODE_PLACEHOLDER,
            &format!("\"{}\"", self.config.application_code),
            1,
        );

        if replaced == text {
            info!(path = %source.display(), "application code already in extension source");
            report.record("application code", false);
            return Ok(());
        }

        info!(path = %source.display(), "injecting application code into extension source");
        fs::write(source, replaced).map_err(|e| IntegrationError::io("write", source, e))?;
        report.record("application code", true);
        Ok(())
    }

    fn align_basic_settings(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let all = [ConfigurationSelector::All];
        let plist_setting = self
            .resolver
            .to_project_relative(&self.extension_info_plist());
        let deployment_target = self.config.extension.deployment_target.clone();
        let composition = Composition::bundle_identifier(&self.config.extension.bundle_id_suffix);

        let mut aligner = BuildSettingsAligner::new(&mut self.project);

        let team = aligner.align_by_name(&self.main_target, extension, &all, "DEVELOPMENT_TEAM")?;
        report.record("DEVELOPMENT_TEAM", team.is_changed());

        let deployment =
            aligner.set_uniform(extension, "IPHONEOS_DEPLOYMENT_TARGET", &deployment_target)?;
        report.record("IPHONEOS_DEPLOYMENT_TARGET", deployment.is_changed());

        let plist = aligner.set_uniform(extension, INFOPLIST_FILE, &plist_setting)?;
        report.record(INFOPLIST_FILE, plist.is_changed());

        let bundle_id = aligner.compose_from_existing(
            &self.main_target,
            extension,
            &all,
            "PRODUCT_BUNDLE_IDENTIFIER",
            &composition,
            &self.resolver,
        )?;
        if bundle_id.changed.is_empty() && bundle_id.unchanged.is_empty() {
            warn!("no bundle identifier found on the main target");
            report.skip("PRODUCT_BUNDLE_IDENTIFIER", "no bundle identifier on the main target");
        } else {
            report.record("PRODUCT_BUNDLE_IDENTIFIER", bundle_id.is_changed());
        }
        Ok(())
    }

    /// Distinct resolved info plists of the main target, in configuration order
    fn main_info_plists(&self) -> Result<Vec<(ConfigurationKind, PathBuf)>, IntegrationError> {
        let mut plists: Vec<(ConfigurationKind, PathBuf)> = Vec::new();
        for config in self.project.configurations(&self.main_target)? {
            let Some(value) =
                self.project
                    .resolved_setting(&self.main_target, &config.id, INFOPLIST_FILE)
            else {
                continue;
            };
            let path = self.resolver.resolve(&value)?;
            if !plists.iter().any(|(_, p)| *p == path) {
                plists.push((config.kind, path));
            }
        }
        Ok(plists)
    }

    fn write_shared_plist_values(
        &mut self,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let plists = self.main_info_plists()?;
        if plists.is_empty() {
            warn!(target = %self.config.main_target, "main target has no INFOPLIST_FILE");
            report.skip("main info plist", "INFOPLIST_FILE not set on the main target");
        }

        let mut changed = false;
        for (_, path) in &plists {
            info!(path = %path.display(), "configuring main info plist");
            changed |= XmlDictStore::set_string(path, APPLICATION_CODE_KEY, &self.config.application_code)?
                .changed();
            changed |= XmlDictStore::set_string(path, APP_GROUP_KEY, &self.config.app_group)?.changed();
            changed |=
                XmlDictStore::add_array_element(path, BACKGROUND_MODES_KEY, REMOTE_NOTIFICATION_MODE)?
                    .changed();
        }
        if !plists.is_empty() {
            report.record("main info plist", changed);
        }

        let extension_plist = self.extension_info_plist();
        info!(path = %extension_plist.display(), "configuring extension info plist");
        let changed =
            XmlDictStore::set_string(&extension_plist, APP_GROUP_KEY, &self.config.app_group)?
                .changed();
        report.record("extension info plist", changed);
        Ok(())
    }

    fn merge_capabilities(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let enabled = json!({ "enabled": 1 });
        let main = json!({
            "SystemCapabilities": {
                APPLICATION_GROUPS_CAPABILITY: enabled,
                PUSH_CAPABILITY: enabled,
                BACKGROUND_MODES_CAPABILITY: enabled,
            }
        });
        let ext = json!({
            "SystemCapabilities": {
                APPLICATION_GROUPS_CAPABILITY: enabled,
            }
        });

        let main_changed = self
            .project
            .merge_target_attributes(&self.main_target, main)?;
        let ext_changed = self.project.merge_target_attributes(extension, ext)?;
        debug!(main_changed, ext_changed, "merged capabilities");
        report.record("capabilities", main_changed || ext_changed);
        Ok(())
    }

    fn embed_extension(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let phase = PhaseSpec::copy_files(EMBED_APP_EXTENSIONS, CopyDestination::PlugIns);

        match self.project.product_reference(extension) {
            Some(product) if self.project.phase_contains(&self.main_target, &phase, &product) => {
                info!("extension product already embedded");
                report.record("embed extension", false);
            }
            Some(product) => {
                info!(phase = %phase, "embedding extension product");
                self.project
                    .add_to_phase(&self.main_target, &phase, &product)?;
                report.record("embed extension", true);
            }
            None => {
                warn!(target = %self.config.extension.target_name, "extension target has no product reference");
                report.skip("embed extension", "extension target has no product reference");
            }
        }

        if self.project.has_dependency(&self.main_target, extension) {
            info!("main target already depends on the extension");
            report.record("target dependency", false);
        } else {
            info!("adding dependency on the extension target");
            self.project.add_dependency(&self.main_target, extension)?;
            report.record("target dependency", true);
        }
        Ok(())
    }

    fn setup_product_settings(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let swift_version = self.config.swift_version.clone();
        let product_name = self.config.extension.target_name.clone();

        let mut aligner = BuildSettingsAligner::new(&mut self.project);
        let swift = aligner.set_uniform(extension, "SWIFT_VERSION", &swift_version)?;
        report.record("SWIFT_VERSION", swift.is_changed());
        let name = aligner.set_uniform(extension, "PRODUCT_NAME", &product_name)?;
        report.record("PRODUCT_NAME", name.is_changed());

        self.mirror_versions(extension, report)
    }

    /// Copy version strings from the main release info plist into the extension's
    ///
    /// Values that reference a build setting (`$(MARKETING_VERSION)`) are copied
    /// verbatim and the setting itself is aligned onto the extension.
    fn mirror_versions(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let plists = self.main_info_plists()?;
        let source = plists
            .iter()
            .find(|(kind, _)| *kind == ConfigurationKind::Release)
            .or_else(|| plists.first())
            .map(|(_, path)| path.clone());
        let Some(source) = source else {
            report.skip("versions", "main target has no info plist");
            return Ok(());
        };

        let destination = self.extension_info_plist();
        let mut changed = false;
        for key in [SHORT_VERSION_KEY, BUNDLE_VERSION_KEY] {
            let Some(value) = XmlDictStore::get_string(&source, key)? else {
                warn!(path = %source.display(), key, "main info plist has no value");
                continue;
            };
            changed |= XmlDictStore::set_string(&destination, key, &value)?.changed();

            if let Some(setting) = referenced_setting(&value) {
                let aligned = BuildSettingsAligner::new(&mut self.project).align_by_name(
                    &self.main_target,
                    extension,
                    &[ConfigurationSelector::All],
                    setting,
                )?;
                changed |= aligned.is_changed();
            }
        }
        report.record("versions", changed);
        Ok(())
    }

    fn setup_entitlements(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let main_assignment = if self.config.cordova {
            self.cordova_entitlements()?
        } else {
            Assignment::collect(&self.project, &self.main_target, &self.resolver)?
        };
        let main_name = (!self.config.cordova).then(|| self.config.main_target.clone());

        info!(target = %self.config.main_target, "setting up main target entitlements");
        let main = EntitlementsWriter::new(&mut self.project, &self.resolver, &self.config.app_group)
            .apply(&main_assignment, main_name.as_deref())?;
        report.record("main target entitlements", main.changed);

        info!(target = %self.config.extension.target_name, "setting up extension entitlements");
        let ext_assignment = Assignment::collect(&self.project, extension, &self.resolver)?;
        let ext = EntitlementsWriter::new(&mut self.project, &self.resolver, &self.config.app_group)
            .apply(&ext_assignment, Some(self.config.extension.target_name.as_str()))?;
        report.record("extension entitlements", ext.changed);
        Ok(())
    }
}

fn install(template: &Template, path: &Path) -> Result<bool, IntegrationError> {
    let written = template
        .install(path)
        .map_err(|e| IntegrationError::io("write", path, e))?;
    if written {
        info!(path = %path.display(), "copied {}", template.file_name);
    } else {
        info!(path = %path.display(), "{} already exists", template.file_name);
    }
    Ok(written)
}

/// Name of the build setting a `$(NAME)` value refers to
fn referenced_setting(value: &str) -> Option<&str> {
    value
        .strip_prefix("$(")
        .and_then(|rest| rest.strip_suffix(')'))
        .filter(|name| !name.is_empty() && !name.contains(['$', '(', ')']))
}
