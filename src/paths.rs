//! Build-setting path resolution
//!
//! Build settings refer to files through Xcode variables (`$(PROJECT_DIR)`,
//! `$(PROJECT_NAME)`). Every path read from the project goes through
//! [`PathResolver::resolve`] before touching the filesystem.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::Regex;
use thiserror::Error;

/// Variables the resolver understands, as listed in diagnostics
pub const SUPPORTED_VARIABLES: &[&str] = &["$(PROJECT_DIR)", "$(PROJECT_NAME)"];

const PROJECT_DIR_TOKENS: [&str; 2] = ["$(PROJECT_DIR)", "$PROJECT_DIR"];
const PROJECT_NAME_TOKENS: [&str; 2] = ["$(PROJECT_NAME)", "$PROJECT_NAME"];

/// Path resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A `$` token other than the supported ones survived substitution
    #[error(
        "Path '{path}' contains unresolved variable {token}; only {} are supported",
        SUPPORTED_VARIABLES.join(" and ")
    )]
    UnresolvedVariable { path: String, token: String },
}

/// Resolves build-setting paths against a concrete project location
#[derive(Debug, Clone)]
pub struct PathResolver {
    project_dir: PathBuf,
    project_name: String,
}

impl PathResolver {
    pub fn new(project_dir: impl Into<PathBuf>, project_name: impl Into<String>) -> Self {
        Self {
            project_dir: project_dir.into(),
            project_name: project_name.into(),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Resolve a build-setting path to an absolute filesystem path
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathError> {
        resolve(path, &self.project_dir, &self.project_name)
    }

    /// Rewrite an absolute path under the project directory into the
    /// `$(PROJECT_DIR)/...` form stored in build settings
    ///
    /// Paths outside the project directory are returned unchanged.
    pub fn to_project_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.project_dir) {
            Ok(rest) if rest.as_os_str().is_empty() => PROJECT_DIR_TOKENS[0].to_string(),
            Ok(rest) => format!("{}/{}", PROJECT_DIR_TOKENS[0], rest.display()),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Substitute the project variables in `path` and make it absolute
///
/// Relative results are joined onto `project_dir`. Any `$` left after
/// substitution is an [`PathError::UnresolvedVariable`].
pub fn resolve(path: &str, project_dir: &Path, project_name: &str) -> Result<PathBuf, PathError> {
    let dir = project_dir.to_string_lossy();
    let mut resolved = path.to_string();
    for token in PROJECT_DIR_TOKENS {
        resolved = resolved.replace(token, &dir);
    }
    for token in PROJECT_NAME_TOKENS {
        resolved = resolved.replace(token, project_name);
    }

    if resolved.contains('$') {
        return Err(PathError::UnresolvedVariable {
            path: path.to_string(),
            token: offending_token(&resolved),
        });
    }

    let resolved = PathBuf::from(resolved);
    if resolved.is_absolute() {
        Ok(resolved)
    } else {
        Ok(project_dir.join(resolved))
    }
}

static VARIABLE: OnceLock<Option<Regex>> = OnceLock::new();

fn offending_token(resolved: &str) -> String {
    VARIABLE
        .get_or_init(|| {
            Regex::new(r"\$(\([A-Za-z_][A-Za-z0-9_:]*\)|\{[A-Za-z_][A-Za-z0-9_:]*\}|[A-Za-z_][A-Za-z0-9_]*)").ok()
        })
        .as_ref()
        .and_then(|pattern| pattern.find(resolved))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "$".to_string())
}
