//! Test fixtures for end-to-end integration runs
//!
//! Builds a small host project in a temp dir: a JSON project model with one
//! application target, its info plist and, optionally, the Cordova
//! entitlements pair.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use mmine::{EffectiveConfig, IntegrationConfig};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const APPLICATION_CODE: &str = "abc123";
pub const APP_GROUP: &str = "group.com.example.app";
pub const MAIN_TARGET: &str = "App";
pub const EXTENSION_TARGET: &str = "MobileMessagingNotificationExtension";
pub const FRAMEWORK_REF: &str = "0000000000000000000000E1";

pub const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>CFBundleIdentifier</key>
	<string>$(PRODUCT_BUNDLE_IDENTIFIER)</string>
	<key>CFBundleShortVersionString</key>
	<string>$(MARKETING_VERSION)</string>
	<key>CFBundleVersion</key>
	<string>7</string>
	<key>UIBackgroundModes</key>
	<array>
		<string>fetch</string>
	</array>
</dict>
</plist>
"#;

pub const EMPTY_ENTITLEMENTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict/>
</plist>
"#;

/// Build settings of the application target's configurations
pub fn default_main_settings() -> Value {
    json!({
        "INFOPLIST_FILE": "$(PROJECT_NAME)/Info.plist",
        "PRODUCT_BUNDLE_IDENTIFIER": "com.example.app",
        "DEVELOPMENT_TEAM": "TEAM123",
        "MARKETING_VERSION": "2.1"
    })
}

/// A host project on disk
pub struct Fixture {
    pub dir: TempDir,
    pub project_path: PathBuf,
}

impl Fixture {
    /// Standard project with default settings and info plist
    pub fn new() -> Self {
        Self::create(default_main_settings(), INFO_PLIST, true)
    }

    /// Project with custom main target settings and info plist contents
    pub fn create(main_settings: Value, info_plist: &str, link_framework: bool) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let project_path = dir.path().join("App.xcodeproj.json");

        let phases = if link_framework {
            json!([
                {"isa": "PBXFrameworksBuildPhase", "id": "0000000000000000000000F1",
                 "files": [FRAMEWORK_REF]},
                {"isa": "PBXCopyFilesBuildPhase", "id": "0000000000000000000000F2",
                 "name": "Embed Frameworks", "destination": "frameworks",
                 "files": [FRAMEWORK_REF]}
            ])
        } else {
            json!([])
        };

        let model = json!({
            "name": "App",
            "main_group": "000000000000000000000001",
            "build_configurations": [
                {"id": "0000000000000000000000C1", "name": "Debug", "build_settings": {}},
                {"id": "0000000000000000000000C2", "name": "Release", "build_settings": {}}
            ],
            "targets": [{
                "id": "0000000000000000000000A1",
                "name": MAIN_TARGET,
                "product_type": "com.apple.product-type.application",
                "build_configurations": [
                    {"id": "0000000000000000000000D1", "name": "Debug", "build_settings": main_settings},
                    {"id": "0000000000000000000000D2", "name": "Release", "build_settings": main_settings}
                ],
                "build_phases": phases
            }],
            "groups": [
                {"id": "000000000000000000000001", "children": ["000000000000000000000002"]},
                {"id": "000000000000000000000002", "name": "Products"}
            ],
            "file_references": [
                {"id": FRAMEWORK_REF,
                 "path": "App/Plugins/com-infobip-plugins-mobilemessaging/MobileMessaging.framework"}
            ]
        });

        fs::write(
            &project_path,
            serde_json::to_string_pretty(&model).expect("serialize model"),
        )
        .expect("write project");
        fs::create_dir_all(dir.path().join("App")).expect("create app dir");
        fs::write(dir.path().join("App/Info.plist"), info_plist).expect("write info plist");

        Self { dir, project_path }
    }

    /// Add the entitlements pair maintained by the Cordova iOS platform
    pub fn with_cordova_entitlements(self) -> Self {
        for name in ["Entitlements-Debug.plist", "Entitlements-Release.plist"] {
            fs::write(self.dir.path().join("App").join(name), EMPTY_ENTITLEMENTS)
                .expect("write entitlements");
        }
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Integration inputs, built through the layered configuration
    pub fn config(&self, cordova: bool) -> IntegrationConfig {
        let cli = json!({
            "application_code": APPLICATION_CODE,
            "project": self.project_path,
            "app_group": APP_GROUP,
            "main_target": MAIN_TARGET,
            "cordova": cordova
        });
        EffectiveConfig::build(None, Some(cli))
            .expect("build config")
            .integration()
            .expect("valid config")
    }

    /// Every file under the fixture directory with its contents
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.dir.path(), &mut files);
        files
    }
}

fn collect(dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            collect(&path, files);
        } else {
            let contents = fs::read(&path).expect("read file");
            files.insert(path, contents);
        }
    }
}
