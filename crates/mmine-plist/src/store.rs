//! File-backed dict store
//!
//! Each operation reads the document from disk, applies one edit and, for
//! mutating operations, writes the whole document back before returning.
//! Nothing is cached between calls, so edits made by other tools in between
//! are always seen.

use std::path::Path;

use tracing::debug;

use crate::dict::{self, EditOutcome};
use crate::document::{Element, PlistDocument};
use crate::error::PlistError;

/// Stateless accessor for dict-rooted plist files
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlDictStore;

impl XmlDictStore {
    /// Read the string value under `key`
    pub fn get_string(path: &Path, key: &str) -> Result<Option<String>, PlistError> {
        let doc = PlistDocument::load(path)?;
        Ok(dict::get_string(root_dict(&doc, path)?, key))
    }

    /// Read the string elements of the array under `key`
    pub fn get_array(path: &Path, key: &str) -> Result<Option<Vec<String>>, PlistError> {
        let doc = PlistDocument::load(path)?;
        Ok(dict::get_array(root_dict(&doc, path)?, key))
    }

    /// Set the string value under `key` and persist the document
    pub fn set_string(path: &Path, key: &str, value: &str) -> Result<EditOutcome, PlistError> {
        let outcome = Self::edit(path, |dict| dict::set_string(dict, key, value))?;
        debug!(path = %path.display(), key, value, ?outcome, "set string");
        Ok(outcome)
    }

    /// Add `value` to the array under `key` (if missing) and persist the document
    pub fn add_array_element(
        path: &Path,
        key: &str,
        value: &str,
    ) -> Result<EditOutcome, PlistError> {
        let outcome = Self::edit(path, |dict| dict::add_array_element(dict, key, value))?;
        debug!(path = %path.display(), key, value, ?outcome, "add array element");
        Ok(outcome)
    }

    fn edit<F>(path: &Path, apply: F) -> Result<EditOutcome, PlistError>
    where
        F: FnOnce(&mut Element) -> EditOutcome,
    {
        let mut doc = PlistDocument::load(path)?;
        let dict = doc
            .dict_mut()
            .ok_or_else(|| PlistError::MissingDict(path.to_path_buf()))?;
        let outcome = apply(dict);
        doc.save(path)?;
        Ok(outcome)
    }
}

fn root_dict<'a>(doc: &'a PlistDocument, path: &Path) -> Result<&'a Element, PlistError> {
    doc.dict()
        .ok_or_else(|| PlistError::MissingDict(path.to_path_buf()))
}
