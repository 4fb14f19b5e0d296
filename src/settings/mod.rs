//! Build setting alignment across configuration groups
//!
//! Writes go through the project model and report, per configuration, whether
//! the value changed. Writing a value that is already in place is a no-op.

use mmine_plist::XmlDictStore;
use tracing::{debug, info, warn};

use crate::error::IntegrationError;
use crate::paths::PathResolver;
use crate::project::{ConfigurationKind, ConfigurationRef, ObjectId, ProjectError, ProjectModel};

pub const INFOPLIST_FILE: &str = "INFOPLIST_FILE";

/// Selects configurations of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationSelector {
    All,
    Kind(ConfigurationKind),
    Named(String),
}

impl ConfigurationSelector {
    pub fn matches(&self, configuration: &ConfigurationRef) -> bool {
        match self {
            ConfigurationSelector::All => true,
            ConfigurationSelector::Kind(kind) => configuration.kind == *kind,
            ConfigurationSelector::Named(name) => &configuration.name == name,
        }
    }
}

/// Whether any selector in the list selects `configuration`
pub fn selected(selectors: &[ConfigurationSelector], configuration: &ConfigurationRef) -> bool {
    selectors.iter().any(|s| s.matches(configuration))
}

/// Per-configuration result of an alignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentOutcome {
    /// Configurations whose value was written
    pub changed: Vec<String>,
    /// Configurations that already held the value
    pub unchanged: Vec<String>,
    /// Configurations left alone because no value or counterpart was found
    pub skipped: Vec<String>,
}

impl AlignmentOutcome {
    pub fn is_changed(&self) -> bool {
        !self.changed.is_empty()
    }

    fn record(&mut self, name: &str, changed: bool) {
        if changed {
            self.changed.push(name.to_string());
        } else {
            self.unchanged.push(name.to_string());
        }
    }
}

/// Derives a value from an existing one plus a fixed suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    /// Appended after a `.` separator
    pub suffix: String,
    /// Info plist key read when the setting is absent
    pub plist_fallback_key: String,
}

impl Composition {
    pub fn bundle_identifier(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            plist_fallback_key: "CFBundleIdentifier".to_string(),
        }
    }

    pub fn compose(&self, existing: &str) -> String {
        format!("{}.{}", existing, self.suffix)
    }
}

/// Writes build settings onto a target's configurations
pub struct BuildSettingsAligner<'a, P: ProjectModel + ?Sized> {
    project: &'a mut P,
}

impl<'a, P: ProjectModel + ?Sized> BuildSettingsAligner<'a, P> {
    pub fn new(project: &'a mut P) -> Self {
        Self { project }
    }

    /// Set `key` to `value` on every configuration of `target`
    pub fn set_uniform(
        &mut self,
        target: &ObjectId,
        key: &str,
        value: &str,
    ) -> Result<AlignmentOutcome, ProjectError> {
        self.set_group(target, &[ConfigurationSelector::All], key, value)
    }

    /// Set `key` to `value` on the selected configurations of `target`
    pub fn set_group(
        &mut self,
        target: &ObjectId,
        selectors: &[ConfigurationSelector],
        key: &str,
        value: &str,
    ) -> Result<AlignmentOutcome, ProjectError> {
        let mut outcome = AlignmentOutcome::default();
        for config in self.project.configurations(target)? {
            if !selected(selectors, &config) {
                continue;
            }
            let changed = self.project.set_setting(&config.id, key, value)?;
            debug!(configuration = %config.name, key, value, changed, "set build setting");
            outcome.record(&config.name, changed);
        }
        Ok(outcome)
    }

    /// Copy `key` from each selected `source` configuration onto the
    /// same-named configuration of `destination`
    ///
    /// Source values are read through inheritance. Configurations without a
    /// value or without a same-named counterpart are skipped.
    pub fn align_by_name(
        &mut self,
        source: &ObjectId,
        destination: &ObjectId,
        selectors: &[ConfigurationSelector],
        key: &str,
    ) -> Result<AlignmentOutcome, ProjectError> {
        self.align_with(source, destination, selectors, key, |_, value| Ok(value))
    }

    /// Write `existing + "." + suffix` onto the same-named destination configurations
    ///
    /// When the source configuration has no value for `key`, the value is read
    /// from the source's info plist instead. A fallback that merely refers back
    /// to `key` itself cannot be composed and is skipped. Any other value,
    /// build variables included, is composed as written.
    pub fn compose_from_existing(
        &mut self,
        source: &ObjectId,
        destination: &ObjectId,
        selectors: &[ConfigurationSelector],
        key: &str,
        composition: &Composition,
        resolver: &PathResolver,
    ) -> Result<AlignmentOutcome, IntegrationError> {
        let project = &*self.project;
        let mut fallbacks = Vec::new();
        for config in project.configurations(source)? {
            if !selected(selectors, &config)
                || project.resolved_setting(source, &config.id, key).is_some()
            {
                continue;
            }
            let Some(plist) = project.resolved_setting(source, &config.id, INFOPLIST_FILE) else {
                continue;
            };
            let plist_path = resolver.resolve(&plist)?;
            let value = XmlDictStore::get_string(&plist_path, &composition.plist_fallback_key)?
                .filter(|v| !is_self_reference(v, key));
            info!(
                configuration = %config.name,
                plist = %plist_path.display(),
                value = value.as_deref().unwrap_or("<none>"),
                "{} not set, using {} from info plist",
                key,
                composition.plist_fallback_key
            );
            fallbacks.push((config.name, value));
        }

        let outcome = self.align_with(source, destination, selectors, key, |name, value| {
            let existing = value.or_else(|| {
                fallbacks
                    .iter()
                    .find(|(n, _)| n == name)
                    .and_then(|(_, v)| v.clone())
            });
            Ok(existing.map(|v| composition.compose(&v)))
        })?;
        Ok(outcome)
    }

    fn align_with<F>(
        &mut self,
        source: &ObjectId,
        destination: &ObjectId,
        selectors: &[ConfigurationSelector],
        key: &str,
        mut value_for: F,
    ) -> Result<AlignmentOutcome, ProjectError>
    where
        F: FnMut(&str, Option<String>) -> Result<Option<String>, ProjectError>,
    {
        let destination_configs = self.project.configurations(destination)?;
        let mut outcome = AlignmentOutcome::default();

        for config in self.project.configurations(source)? {
            if !selected(selectors, &config) {
                continue;
            }
            let Some(counterpart) = destination_configs.iter().find(|c| c.name == config.name)
            else {
                debug!(configuration = %config.name, key, "no same-named destination configuration");
                outcome.skipped.push(config.name);
                continue;
            };

            let current = self.project.resolved_setting(source, &config.id, key);
            let Some(value) = value_for(&config.name, current)? else {
                warn!(configuration = %config.name, key, "no source value, leaving setting untouched");
                outcome.skipped.push(config.name);
                continue;
            };

            let changed = self.project.set_setting(&counterpart.id, key, &value)?;
            debug!(configuration = %config.name, key, value = %value, changed, "aligned build setting");
            outcome.record(&config.name, changed);
        }

        Ok(outcome)
    }
}

/// `$(KEY)` or `${KEY}` with nothing around it
fn is_self_reference(value: &str, key: &str) -> bool {
    let inner = value
        .strip_prefix("$(")
        .and_then(|v| v.strip_suffix(')'))
        .or_else(|| value.strip_prefix("${").and_then(|v| v.strip_suffix('}')));
    inner == Some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{JsonProject, ProjectDocument};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const MAIN: &str = "0000000000000000000000A1";
    const EXT: &str = "0000000000000000000000A2";

    fn project(dir: &Path, main_settings: [serde_json::Value; 2]) -> JsonProject {
        let [debug, release] = main_settings;
        let document: ProjectDocument = serde_json::from_value(json!({
            "main_group": "000000000000000000000001",
            "targets": [
                {
                    "id": MAIN, "name": "App",
                    "product_type": "com.apple.product-type.application",
                    "build_configurations": [
                        {"id": "0000000000000000000000D1", "name": "Debug", "build_settings": debug},
                        {"id": "0000000000000000000000D2", "name": "Release", "build_settings": release},
                        {"id": "0000000000000000000000D3", "name": "Staging", "kind": "release",
                         "build_settings": {"DEVELOPMENT_TEAM": "STAGE"}}
                    ]
                },
                {
                    "id": EXT, "name": "Ext",
                    "product_type": "com.apple.product-type.app-extension",
                    "build_configurations": [
                        {"id": "0000000000000000000000E1", "name": "Debug", "build_settings": {}},
                        {"id": "0000000000000000000000E2", "name": "Release", "build_settings": {}}
                    ]
                }
            ],
            "groups": [{"id": "000000000000000000000001"}]
        }))
        .unwrap();
        JsonProject::from_document(&dir.join("App.xcodeproj.json"), document)
    }

    fn ext_value(project: &JsonProject, config: &str, key: &str) -> Option<String> {
        project.setting(&ObjectId::new(config), key)
    }

    #[test]
    fn test_set_uniform_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut project = project(dir.path(), [json!({}), json!({})]);
        let ext = ObjectId::new(EXT);

        let first = BuildSettingsAligner::new(&mut project)
            .set_uniform(&ext, "IPHONEOS_DEPLOYMENT_TARGET", "10.0")
            .unwrap();
        assert_eq!(first.changed, vec!["Debug", "Release"]);

        let second = BuildSettingsAligner::new(&mut project)
            .set_uniform(&ext, "IPHONEOS_DEPLOYMENT_TARGET", "10.0")
            .unwrap();
        assert!(!second.is_changed());
        assert_eq!(second.unchanged, vec!["Debug", "Release"]);
    }

    #[test]
    fn test_set_group_by_kind() {
        let dir = TempDir::new().unwrap();
        let mut project = project(dir.path(), [json!({}), json!({})]);
        let main = ObjectId::new(MAIN);

        let outcome = BuildSettingsAligner::new(&mut project)
            .set_group(
                &main,
                &[ConfigurationSelector::Kind(ConfigurationKind::Release)],
                "X",
                "1",
            )
            .unwrap();
        assert_eq!(outcome.changed, vec!["Release", "Staging"]);
        assert_eq!(ext_value(&project, "0000000000000000000000D1", "X"), None);
    }

    #[test]
    fn test_set_group_by_name() {
        let dir = TempDir::new().unwrap();
        let mut project = project(dir.path(), [json!({}), json!({})]);
        let main = ObjectId::new(MAIN);

        let outcome = BuildSettingsAligner::new(&mut project)
            .set_group(
                &main,
                &[
                    ConfigurationSelector::Named("Staging".to_string()),
                    ConfigurationSelector::Kind(ConfigurationKind::Debug),
                ],
                "X",
                "1",
            )
            .unwrap();
        assert_eq!(outcome.changed, vec!["Debug", "Staging"]);
        assert_eq!(ext_value(&project, "0000000000000000000000D2", "X"), None);
    }

    #[test]
    fn test_align_by_name_skips_missing_counterpart() {
        let dir = TempDir::new().unwrap();
        let mut project = project(
            dir.path(),
            [json!({"DEVELOPMENT_TEAM": "TEAMD"}), json!({"DEVELOPMENT_TEAM": "TEAMR"})],
        );
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));

        let outcome = BuildSettingsAligner::new(&mut project)
            .align_by_name(&main, &ext, &[ConfigurationSelector::All], "DEVELOPMENT_TEAM")
            .unwrap();

        assert_eq!(outcome.changed, vec!["Debug", "Release"]);
        assert_eq!(outcome.skipped, vec!["Staging"]);
        assert_eq!(
            ext_value(&project, "0000000000000000000000E1", "DEVELOPMENT_TEAM"),
            Some("TEAMD".to_string())
        );
        assert_eq!(
            ext_value(&project, "0000000000000000000000E2", "DEVELOPMENT_TEAM"),
            Some("TEAMR".to_string())
        );
    }

    #[test]
    fn test_align_by_name_missing_value_skipped() {
        let dir = TempDir::new().unwrap();
        let mut project = project(dir.path(), [json!({"DEVELOPMENT_TEAM": "T"}), json!({})]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));

        let outcome = BuildSettingsAligner::new(&mut project)
            .align_by_name(&main, &ext, &[ConfigurationSelector::All], "DEVELOPMENT_TEAM")
            .unwrap();
        assert_eq!(outcome.changed, vec!["Debug"]);
        assert!(outcome.skipped.contains(&"Release".to_string()));
        assert_eq!(ext_value(&project, "0000000000000000000000E2", "DEVELOPMENT_TEAM"), None);
    }

    #[test]
    fn test_compose_bundle_identifier() {
        let dir = TempDir::new().unwrap();
        let mut project = project(
            dir.path(),
            [
                json!({"PRODUCT_BUNDLE_IDENTIFIER": "com.x"}),
                json!({"PRODUCT_BUNDLE_IDENTIFIER": "com.x"}),
            ],
        );
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        let outcome = BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap();

        assert_eq!(outcome.changed, vec!["Debug", "Release"]);
        for config in ["0000000000000000000000E1", "0000000000000000000000E2"] {
            assert_eq!(
                ext_value(&project, config, "PRODUCT_BUNDLE_IDENTIFIER"),
                Some("com.x.notification-extension".to_string())
            );
        }
    }

    #[test]
    fn test_compose_falls_back_to_info_plist() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("App")).unwrap();
        fs::write(
            dir.path().join("App/Info.plist"),
            "<plist version=\"1.0\"><dict><key>CFBundleIdentifier</key><string>com.plist</string></dict></plist>",
        )
        .unwrap();
        let plist = json!({"INFOPLIST_FILE": "$(PROJECT_NAME)/Info.plist"});
        let mut project = project(dir.path(), [plist.clone(), plist]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap();

        assert_eq!(
            ext_value(&project, "0000000000000000000000E1", "PRODUCT_BUNDLE_IDENTIFIER"),
            Some("com.plist.notification-extension".to_string())
        );
        assert_eq!(
            ext_value(&project, "0000000000000000000000E2", "PRODUCT_BUNDLE_IDENTIFIER"),
            Some("com.plist.notification-extension".to_string())
        );
    }

    #[test]
    fn test_compose_skips_self_referencing_plist_value() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Info.plist"),
            "<plist><dict><key>CFBundleIdentifier</key><string>$(PRODUCT_BUNDLE_IDENTIFIER)</string></dict></plist>",
        )
        .unwrap();
        let plist = json!({"INFOPLIST_FILE": "Info.plist"});
        let mut project = project(dir.path(), [plist.clone(), plist]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        let outcome = BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap();
        assert!(!outcome.is_changed());
        assert_eq!(ext_value(&project, "0000000000000000000000E1", "PRODUCT_BUNDLE_IDENTIFIER"), None);
    }

    #[test]
    fn test_compose_unresolved_plist_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let plist = json!({"INFOPLIST_FILE": "$(SRCROOT)/Info.plist"});
        let mut project = project(dir.path(), [plist.clone(), plist]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        let err = BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Path(_)));
    }

    #[test]
    fn test_compose_keeps_build_variable_in_setting() {
        let dir = TempDir::new().unwrap();
        let id = json!({"PRODUCT_BUNDLE_IDENTIFIER": "com.x.$(PRODUCT_NAME:rfc1034identifier)"});
        let mut project = project(dir.path(), [id.clone(), id]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        let outcome = BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap();

        assert_eq!(outcome.changed, vec!["Debug".to_string(), "Release".to_string()]);
        for config in ["0000000000000000000000E1", "0000000000000000000000E2"] {
            assert_eq!(
                ext_value(&project, config, "PRODUCT_BUNDLE_IDENTIFIER"),
                Some("com.x.$(PRODUCT_NAME:rfc1034identifier).notification-extension".to_string())
            );
        }
    }

    #[test]
    fn test_compose_keeps_build_variable_from_plist() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Info.plist"),
            "<plist><dict><key>CFBundleIdentifier</key><string>com.x.$(PRODUCT_NAME)</string></dict></plist>",
        )
        .unwrap();
        let plist = json!({"INFOPLIST_FILE": "Info.plist"});
        let mut project = project(dir.path(), [plist.clone(), plist]);
        let (main, ext) = (ObjectId::new(MAIN), ObjectId::new(EXT));
        let resolver = PathResolver::new(dir.path(), "App");

        BuildSettingsAligner::new(&mut project)
            .compose_from_existing(
                &main,
                &ext,
                &[ConfigurationSelector::All],
                "PRODUCT_BUNDLE_IDENTIFIER",
                &Composition::bundle_identifier("notification-extension"),
                &resolver,
            )
            .unwrap();

        assert_eq!(
            ext_value(&project, "0000000000000000000000E1", "PRODUCT_BUNDLE_IDENTIFIER"),
            Some("com.x.$(PRODUCT_NAME).notification-extension".to_string())
        );
    }

    #[test]
    fn test_is_self_reference() {
        assert!(is_self_reference("$(PRODUCT_BUNDLE_IDENTIFIER)", "PRODUCT_BUNDLE_IDENTIFIER"));
        assert!(is_self_reference("${PRODUCT_BUNDLE_IDENTIFIER}", "PRODUCT_BUNDLE_IDENTIFIER"));
        assert!(!is_self_reference("com.x.$(PRODUCT_NAME)", "PRODUCT_BUNDLE_IDENTIFIER"));
        assert!(!is_self_reference("$(PRODUCT_NAME)", "PRODUCT_BUNDLE_IDENTIFIER"));
    }
}
