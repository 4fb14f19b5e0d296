//! End-to-end integration tests
//!
//! Runs the full integrator against fixture projects on disk and inspects the
//! resulting project model, plists and entitlements.

mod fixtures;

use fixtures::{Fixture, APPLICATION_CODE, APP_GROUP, EXTENSION_TARGET, INFO_PLIST, MAIN_TARGET};
use mmine::entitlements::{APPLICATION_GROUPS_KEY, APS_ENVIRONMENT_KEY, CODE_SIGN_ENTITLEMENTS};
use mmine::integrator::{APPLICATION_CODE_KEY, APP_GROUP_KEY, BACKGROUND_MODES_KEY};
use mmine::project::{BuildPhase, CopyDestination, ObjectId, PhaseSpec};
use mmine::report::StepStatus;
use mmine::{
    IntegrationError, IntegrationReport, JsonProject, NotificationExtensionIntegrator,
    ProjectModel,
};
use mmine_plist::XmlDictStore;
use serde_json::json;
use std::fs;
use std::path::Path;

fn integrate(fixture: &Fixture, cordova: bool) -> Result<IntegrationReport, IntegrationError> {
    let project = JsonProject::open(&fixture.project_path)?;
    let mut integrator = NotificationExtensionIntegrator::new(project, fixture.config(cordova))?;
    integrator.run()
}

/// Settings of a target's configuration, by configuration name
fn setting(project: &JsonProject, target: &str, config: &str, key: &str) -> Option<String> {
    let target = project.find_target(target)?;
    let config = project
        .configurations(&target)
        .unwrap()
        .into_iter()
        .find(|c| c.name == config)?;
    project.setting(&config.id, key)
}

fn string(path: &Path, key: &str) -> Option<String> {
    XmlDictStore::get_string(path, key).unwrap()
}

fn array(path: &Path, key: &str) -> Vec<String> {
    XmlDictStore::get_array(path, key).unwrap().unwrap_or_default()
}

#[test]
fn test_second_run_is_byte_identical() {
    let fixture = Fixture::new();

    let first = integrate(&fixture, false).unwrap();
    assert!(first.changed());
    let after_first = fixture.snapshot();

    let second = integrate(&fixture, false).unwrap();
    let after_second = fixture.snapshot();

    assert_eq!(after_first.keys().collect::<Vec<_>>(), after_second.keys().collect::<Vec<_>>());
    for (path, contents) in &after_first {
        assert_eq!(
            contents,
            &after_second[path],
            "{} changed on the second run",
            path.display()
        );
    }
    assert!(!second.changed(), "second run applied: {:?}", second.steps);
    assert!(second.human_summary.contains("nothing to change"));
}

#[test]
fn test_extension_target_settings() {
    let fixture = Fixture::new();
    integrate(&fixture, false).unwrap();

    let project = JsonProject::open(&fixture.project_path).unwrap();
    for config in ["Debug", "Release"] {
        let get = |key| setting(&project, EXTENSION_TARGET, config, key);
        assert_eq!(get("DEVELOPMENT_TEAM").as_deref(), Some("TEAM123"));
        assert_eq!(get("IPHONEOS_DEPLOYMENT_TARGET").as_deref(), Some("10.0"));
        assert_eq!(
            get("PRODUCT_BUNDLE_IDENTIFIER").as_deref(),
            Some("com.example.app.notification-extension")
        );
        assert_eq!(
            get("INFOPLIST_FILE").as_deref(),
            Some("$(PROJECT_DIR)/NotificationExtension/MobileMessagingNotificationServiceExtension.plist")
        );
        assert_eq!(get("SWIFT_VERSION").as_deref(), Some("5"));
        assert_eq!(get("PRODUCT_NAME").as_deref(), Some(EXTENSION_TARGET));
        assert_eq!(get("MARKETING_VERSION").as_deref(), Some("2.1"));
    }
}

#[test]
fn test_extension_sources_and_wiring() {
    let fixture = Fixture::new();
    integrate(&fixture, false).unwrap();

    let source = fs::read_to_string(fixture.path("NotificationExtension/NotificationService.swift")).unwrap();
    assert!(source.contains(&format!("\"{}\"", APPLICATION_CODE)));
    assert!(!source.contains(mmine::templates::APPLICATION_CODE_PLACEHOLDER));

    let project = JsonProject::open(&fixture.project_path).unwrap();
    let main = project.find_target(MAIN_TARGET).unwrap();
    let extension = project.find_target(EXTENSION_TARGET).unwrap();

    assert!(project
        .find_phase_file(&extension, &PhaseSpec::Sources, "NotificationService.swift")
        .is_some());
    let product = project.product_reference(&extension).unwrap();
    assert!(project.phase_contains(
        &main,
        &PhaseSpec::copy_files("Embed App Extensions", CopyDestination::PlugIns),
        &product
    ));
    assert!(project.has_dependency(&main, &extension));

    let attributes = &project.document().attributes["TargetAttributes"];
    let capabilities = &attributes[main.as_str()]["SystemCapabilities"];
    assert_eq!(capabilities["com.apple.Push"]["enabled"], 1);
    assert_eq!(capabilities["com.apple.ApplicationGroups.iOS"]["enabled"], 1);
    assert_eq!(
        attributes[extension.as_str()]["SystemCapabilities"]["com.apple.ApplicationGroups.iOS"]["enabled"],
        1
    );
}

#[test]
fn test_info_plists() {
    let fixture = Fixture::new();
    integrate(&fixture, false).unwrap();
    integrate(&fixture, false).unwrap();

    let main = fixture.path("App/Info.plist");
    assert_eq!(string(&main, APPLICATION_CODE_KEY).as_deref(), Some(APPLICATION_CODE));
    assert_eq!(string(&main, APP_GROUP_KEY).as_deref(), Some(APP_GROUP));
    assert_eq!(array(&main, BACKGROUND_MODES_KEY), vec!["fetch", "remote-notification"]);
    assert!(fs::read_to_string(&main).unwrap().contains("<!DOCTYPE plist"));

    let extension = fixture.path("NotificationExtension/MobileMessagingNotificationServiceExtension.plist");
    assert_eq!(string(&extension, APP_GROUP_KEY).as_deref(), Some(APP_GROUP));
    assert_eq!(
        string(&extension, "CFBundleShortVersionString").as_deref(),
        Some("$(MARKETING_VERSION)")
    );
    assert_eq!(string(&extension, "CFBundleVersion").as_deref(), Some("7"));
}

#[test]
fn test_entitlements_created_for_both_targets() {
    let fixture = Fixture::new();
    integrate(&fixture, false).unwrap();

    let project = JsonProject::open(&fixture.project_path).unwrap();
    for (target, file) in [
        (MAIN_TARGET, "App.entitlements"),
        (EXTENSION_TARGET, "MobileMessagingNotificationExtension.entitlements"),
    ] {
        let path = fixture.path(file);
        assert_eq!(array(&path, APPLICATION_GROUPS_KEY), vec![APP_GROUP]);
        assert_eq!(string(&path, APS_ENVIRONMENT_KEY).as_deref(), Some("development"));
        for config in ["Debug", "Release"] {
            assert_eq!(
                setting(&project, target, config, CODE_SIGN_ENTITLEMENTS),
                Some(format!("$(PROJECT_DIR)/{}", file))
            );
        }
    }
}

#[test]
fn test_bundle_id_from_info_plist() {
    let settings = json!({
        "INFOPLIST_FILE": "$(PROJECT_NAME)/Info.plist",
        "DEVELOPMENT_TEAM": "TEAM123"
    });
    let plist = INFO_PLIST.replace("$(PRODUCT_BUNDLE_IDENTIFIER)", "com.plist.app");
    let fixture = Fixture::create(settings, &plist, true);

    integrate(&fixture, false).unwrap();

    let project = JsonProject::open(&fixture.project_path).unwrap();
    for config in ["Debug", "Release"] {
        assert_eq!(
            setting(&project, EXTENSION_TARGET, config, "PRODUCT_BUNDLE_IDENTIFIER").as_deref(),
            Some("com.plist.app.notification-extension")
        );
    }
}

#[test]
fn test_unresolved_variable_aborts() {
    let settings = json!({"INFOPLIST_FILE": "$(SRCROOT)/App/Info.plist"});
    let fixture = Fixture::create(settings, INFO_PLIST, true);
    let before = fs::read(&fixture.project_path).unwrap();

    let err = integrate(&fixture, false).unwrap_err();

    assert!(matches!(err, IntegrationError::Path(_)));
    assert!(err.to_string().contains("$(SRCROOT)/App/Info.plist"));
    assert!(err.remediation().unwrap().contains("$(PROJECT_DIR)"));
    assert_eq!(err.exit_code(), 1);
    // the project model is only persisted at the end
    assert_eq!(fs::read(&fixture.project_path).unwrap(), before);
}

#[test]
fn test_unknown_main_target() {
    let fixture = Fixture::new();
    let project = JsonProject::open(&fixture.project_path).unwrap();
    let mut config = fixture.config(false);
    config.main_target = "Missing".to_string();

    let err = NotificationExtensionIntegrator::new(project, config)
        .err()
        .unwrap();
    assert!(matches!(err, IntegrationError::TargetNotFound(ref name) if name == "Missing"));
}

#[test]
fn test_cordova_mode() {
    let fixture = Fixture::new().with_cordova_entitlements();
    integrate(&fixture, true).unwrap();

    let project = JsonProject::open(&fixture.project_path).unwrap();
    let main = project.find_target(MAIN_TARGET).unwrap();
    let extension = project.find_target(EXTENSION_TARGET).unwrap();
    let framework = ObjectId::new(fixtures::FRAMEWORK_REF);

    assert!(project.phase_contains(&extension, &PhaseSpec::Frameworks, &framework));
    assert!(!project.phase_contains(
        &main,
        &PhaseSpec::copy_files("Embed Frameworks", CopyDestination::Frameworks),
        &framework
    ));
    assert!(project.phase_contains(&main, &PhaseSpec::Frameworks, &framework));

    let target = project
        .document()
        .targets
        .iter()
        .find(|t| t.id == extension)
        .unwrap();
    let script = target.build_phases.iter().find_map(|p| match p {
        BuildPhase::ShellScript {
            shell_script,
            input_paths,
            ..
        } => Some((shell_script, input_paths)),
        _ => None,
    });
    let (shell_script, input_paths) = script.unwrap();
    assert_eq!(shell_script, "/usr/local/bin/carthage copy-frameworks");
    assert_eq!(
        input_paths,
        &vec!["$(PROJECT_DIR)/$(PROJECT_NAME)/Plugins/com-infobip-plugins-mobilemessaging/MobileMessaging.framework".to_string()]
    );

    assert!(setting(&project, EXTENSION_TARGET, "Debug", "FRAMEWORK_SEARCH_PATHS")
        .unwrap()
        .contains("com-infobip-plugins-mobilemessaging"));

    let debug = fixture.path("App/Entitlements-Debug.plist");
    let release = fixture.path("App/Entitlements-Release.plist");
    assert_eq!(string(&debug, APS_ENVIRONMENT_KEY).as_deref(), Some("development"));
    assert_eq!(string(&release, APS_ENVIRONMENT_KEY).as_deref(), Some("production"));
    assert_eq!(array(&release, APPLICATION_GROUPS_KEY), vec![APP_GROUP]);
    assert_eq!(setting(&project, MAIN_TARGET, "Debug", CODE_SIGN_ENTITLEMENTS), None);
    assert!(!fixture.path("App.entitlements").exists());
}

#[test]
fn test_cordova_second_run_is_byte_identical() {
    let fixture = Fixture::new().with_cordova_entitlements();
    integrate(&fixture, true).unwrap();
    let after_first = fixture.snapshot();

    let second = integrate(&fixture, true).unwrap();

    assert_eq!(after_first, fixture.snapshot());
    assert!(!second.changed(), "second run applied: {:?}", second.steps);
}

#[test]
fn test_cordova_without_framework_continues() {
    let fixture = Fixture::create(fixtures::default_main_settings(), INFO_PLIST, false);

    let report = integrate(&fixture, true).unwrap();

    let linkage = report
        .steps
        .iter()
        .find(|s| s.step == "framework linkage")
        .unwrap();
    assert_eq!(linkage.status, StepStatus::Skipped);
    assert!(linkage.detail.as_deref().unwrap().contains("MobileMessaging.framework"));
    assert!(fixture.path("MobileMessagingNotificationExtension.entitlements").exists());
}
