//! Entitlements assignment decisions
//!
//! Pure decision logic: given the files currently assigned to the debug and
//! release sides of a target, decide what to fabricate and what to patch.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

/// Value written under `aps-environment`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApsEnvironment {
    Development,
    Production,
}

impl ApsEnvironment {
    pub fn as_str(self) -> &'static str {
        match self {
            ApsEnvironment::Development => "development",
            ApsEnvironment::Production => "production",
        }
    }
}

impl fmt::Display for ApsEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to one side of a split assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidePlan {
    /// Patch the files already assigned
    Patch(BTreeSet<PathBuf>),
    /// Create a side-specific file, assign it, then patch it
    Fabricate { file_name: String },
    /// Nothing assigned and nothing to create
    Skip,
}

/// Decision for a debug/release pair of entitlements assignments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementsPlan {
    Nothing,
    /// Create one file shared by both sides, patched as development
    CreateShared { file_name: String },
    /// Both sides already point at the same files
    PatchShared { files: BTreeSet<PathBuf> },
    Split { debug: SidePlan, release: SidePlan },
}

impl EntitlementsPlan {
    /// Decide from the resolved file sets of each side
    ///
    /// Without a target name nothing is ever fabricated.
    pub fn decide(
        debug: &BTreeSet<PathBuf>,
        release: &BTreeSet<PathBuf>,
        target_name: Option<&str>,
    ) -> Self {
        if debug.is_empty() && release.is_empty() {
            return match target_name {
                Some(name) => EntitlementsPlan::CreateShared {
                    file_name: format!("{}.entitlements", name),
                },
                None => EntitlementsPlan::Nothing,
            };
        }

        if debug == release {
            return EntitlementsPlan::PatchShared {
                files: debug.clone(),
            };
        }

        let side = |files: &BTreeSet<PathBuf>, suffix: &str| {
            if !files.is_empty() {
                SidePlan::Patch(files.clone())
            } else if let Some(name) = target_name {
                SidePlan::Fabricate {
                    file_name: format!("{}_{}.entitlements", name, suffix),
                }
            } else {
                SidePlan::Skip
            }
        };

        EntitlementsPlan::Split {
            debug: side(debug, "debug"),
            release: side(release, "release"),
        }
    }
}
