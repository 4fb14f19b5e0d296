//! Cordova packaging steps
//!
//! Cordova apps ship `MobileMessaging.framework` inside the plugin directory
//! and copy it with Carthage, so the extension needs extra search paths and
//! the main target must not embed the framework a second time.

use tracing::{info, warn};

use super::NotificationExtensionIntegrator;
use crate::entitlements::Assignment;
use crate::error::IntegrationError;
use crate::project::{CopyDestination, ObjectId, PhaseSpec, ProjectModel};
use crate::report::IntegrationReport;
use crate::settings::BuildSettingsAligner;

pub const FRAMEWORK_NAME: &str = "MobileMessaging.framework";

const PLUGIN_DIR: &str = "$(PROJECT_DIR)/$(PROJECT_NAME)/Plugins/com-infobip-plugins-mobilemessaging";
const RUNPATH_SEARCH_PATHS: &str = "$(inherited) @executable_path/Frameworks @executable_path/../../Frameworks";
const COPY_FRAMEWORKS_PHASE: &str = "Copy Frameworks";
const COPY_FRAMEWORKS_SCRIPT: &str = "/usr/local/bin/carthage copy-frameworks";
const EMBED_FRAMEWORKS: &str = "Embed Frameworks";

const DEBUG_ENTITLEMENTS: &str = "$(PROJECT_DIR)/$(PROJECT_NAME)/Entitlements-Debug.plist";
const RELEASE_ENTITLEMENTS: &str = "$(PROJECT_DIR)/$(PROJECT_NAME)/Entitlements-Release.plist";

impl<P: ProjectModel> NotificationExtensionIntegrator<P> {
    pub(super) fn run_cordova_steps(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        info!("running cordova packaging steps");
        let search_paths = format!("$(inherited) {}", PLUGIN_DIR);

        let mut aligner = BuildSettingsAligner::new(&mut self.project);
        let framework = aligner.set_uniform(extension, "FRAMEWORK_SEARCH_PATHS", &search_paths)?;
        report.record("FRAMEWORK_SEARCH_PATHS", framework.is_changed());
        let runpath =
            aligner.set_uniform(extension, "LD_RUNPATH_SEARCH_PATHS", RUNPATH_SEARCH_PATHS)?;
        report.record("LD_RUNPATH_SEARCH_PATHS", runpath.is_changed());

        self.mirror_framework_linkage(extension, report)?;

        let input_paths = vec![format!("{}/{}", PLUGIN_DIR, FRAMEWORK_NAME)];
        let script = self.project.ensure_shell_script_phase(
            extension,
            COPY_FRAMEWORKS_PHASE,
            COPY_FRAMEWORKS_SCRIPT,
            &input_paths,
        )?;
        report.record("copy frameworks phase", script);

        self.remove_framework_embedding(report)
    }

    /// Link the extension against the framework the main target links
    fn mirror_framework_linkage(
        &mut self,
        extension: &ObjectId,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let Some(framework) =
            self.project
                .find_phase_file(&self.main_target, &PhaseSpec::Frameworks, FRAMEWORK_NAME)
        else {
            warn!(
                target = %self.config.main_target,
                "{} is not linked by the main target, skipping extension linkage",
                FRAMEWORK_NAME
            );
            report.skip(
                "framework linkage",
                format!("{} not linked by the main target", FRAMEWORK_NAME),
            );
            return Ok(());
        };

        if self
            .project
            .phase_contains(extension, &PhaseSpec::Frameworks, &framework)
        {
            info!("extension already links {}", FRAMEWORK_NAME);
            report.record("framework linkage", false);
        } else {
            info!("linking {} into the extension", FRAMEWORK_NAME);
            self.project
                .add_to_phase(extension, &PhaseSpec::Frameworks, &framework)?;
            report.record("framework linkage", true);
        }
        Ok(())
    }

    /// Carthage copies the framework, so the main target must not embed it
    fn remove_framework_embedding(
        &mut self,
        report: &mut IntegrationReport,
    ) -> Result<(), IntegrationError> {
        let phase = PhaseSpec::copy_files(EMBED_FRAMEWORKS, CopyDestination::Frameworks);
        let removed = match self
            .project
            .find_phase_file(&self.main_target, &phase, FRAMEWORK_NAME)
        {
            Some(file) => {
                info!(phase = %phase, "removing {} from the main target", FRAMEWORK_NAME);
                self.project
                    .remove_from_phase(&self.main_target, &phase, &file)?
            }
            None => false,
        };
        report.record("embed frameworks cleanup", removed);
        Ok(())
    }

    /// The entitlements pair maintained by the Cordova iOS platform
    ///
    /// Only files that exist are returned; they are never created here.
    pub(super) fn cordova_entitlements(&self) -> Result<Assignment, IntegrationError> {
        let mut sides: [Vec<_>; 2] = [Vec::new(), Vec::new()];
        for (side, setting) in sides.iter_mut().zip([DEBUG_ENTITLEMENTS, RELEASE_ENTITLEMENTS]) {
            let path = self.resolver.resolve(setting)?;
            if path.is_file() {
                side.push(path);
            } else {
                warn!(path = %path.display(), "cordova entitlements file not found");
            }
        }
        let [debug, release] = sides;
        Ok(Assignment::fixed(debug, release))
    }
}
