//! Built-in integration defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Name of the notification extension target
    pub extension_target_name: String,

    /// Directory (under the project directory) holding the extension sources
    pub extension_directory: String,

    /// Navigator group the extension files are registered in
    pub extension_group: String,

    /// IPHONEOS_DEPLOYMENT_TARGET for the extension
    pub deployment_target: String,

    /// Appended to the main bundle identifier for the extension
    pub bundle_id_suffix: String,

    /// SWIFT_VERSION for the extension
    pub swift_version: String,

    /// Cordova packaging mode
    pub cordova: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            extension_target_name: "MobileMessagingNotificationExtension".to_string(),
            extension_directory: "NotificationExtension".to_string(),
            extension_group: "NotificationExtensionGroup".to_string(),
            deployment_target: "10.0".to_string(),
            bundle_id_suffix: "notification-extension".to_string(),
            swift_version: "5".to_string(),
            cordova: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "swift_version": self.swift_version,
            "cordova": self.cordova,
            "extension": {
                "target_name": self.extension_target_name,
                "directory": self.extension_directory,
                "group": self.extension_group,
                "deployment_target": self.deployment_target,
                "bundle_id_suffix": self.bundle_id_suffix
            }
        })
    }
}
