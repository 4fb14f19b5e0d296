//! Property list editing for the notification extension integrator
//!
//! Supports the subset of Apple's property list XML the integrator touches:
//! a top-level `<dict>` of `<key>` / `<string>` / `<array>` pairs. Edits are
//! idempotent and never reorder or drop existing entries.

pub mod dict;
mod document;
mod error;
mod store;

pub use dict::EditOutcome;
pub use document::{Element, Node, PlistDocument, XML_DECLARATION};
pub use error::PlistError;
pub use store::XmlDictStore;
