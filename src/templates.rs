//! File templates installed into the host project
//!
//! Templates are compiled into the binary. Installing never overwrites an
//! existing file, so user edits survive re-runs.

use std::fs;
use std::io;
use std::path::Path;

/// Placeholder in the extension source replaced by the quoted application code
pub const APPLICATION_CODE_PLACEHOLDER: &str = "<# put your Application Code here #>";

/// A named template file
#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub file_name: &'static str,
    pub contents: &'static str,
}

/// Notification service extension source
pub const EXTENSION_SOURCE: Template = Template {
    file_name: "NotificationService.swift",
    contents: include_str!("../resources/NotificationService.swift"),
};

/// Notification service extension info plist
pub const EXTENSION_INFO_PLIST: Template = Template {
    file_name: "MobileMessagingNotificationServiceExtension.plist",
    contents: include_str!("../resources/MobileMessagingNotificationServiceExtension.plist"),
};

/// Entitlements file with an empty application-groups array
pub const ENTITLEMENTS: Template = Template {
    file_name: "MobileMessagingNotificationExtension.entitlements",
    contents: include_str!("../resources/MobileMessagingNotificationExtension.entitlements"),
};

impl Template {
    /// Write the template to `destination` unless a file is already there
    ///
    /// Returns whether the file was written.
    pub fn install(&self, destination: &Path) -> io::Result<bool> {
        if destination.exists() {
            return Ok(false);
        }
        fs::write(destination, self.contents)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_has_placeholder() {
        assert!(EXTENSION_SOURCE.contents.contains(APPLICATION_CODE_PLACEHOLDER));
    }

    #[test]
    fn test_plist_templates_parse() {
        for template in [EXTENSION_INFO_PLIST, ENTITLEMENTS] {
            let doc = mmine_plist::PlistDocument::parse(template.contents).unwrap();
            assert!(doc.dict().is_some(), "{} has no dict", template.file_name);
        }
    }

    #[test]
    fn test_install_never_overwrites() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ENTITLEMENTS.file_name);

        assert!(ENTITLEMENTS.install(&path).unwrap());
        fs::write(&path, "edited").unwrap();
        assert!(!ENTITLEMENTS.install(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "edited");
    }
}
