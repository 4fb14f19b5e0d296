//! Key/value editing on a plist `<dict>` element
//!
//! A dict is an ordered run of `<key>` elements, each followed by its value
//! element. Lookups take the first matching key; duplicates are tolerated and
//! never repaired. Every edit either leaves the dict untouched or adds nodes,
//! so repeating an edit is a no-op.

use crate::document::{Element, Node};

/// What an edit did to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// New nodes were added
    Inserted,
    /// An existing value was overwritten in place
    Updated,
    /// The document already held the desired value
    Unchanged,
}

impl EditOutcome {
    /// Whether the edit changed anything
    pub fn changed(self) -> bool {
        !matches!(self, EditOutcome::Unchanged)
    }
}

/// Index of the first `<key>` child whose text equals `key`
pub fn find_key(dict: &Element, key: &str) -> Option<usize> {
    dict.children.iter().position(|child| match child {
        Node::Element(element) => element.is("key") && element.text() == key,
        _ => false,
    })
}

/// Index of the first element sibling after `index`
fn next_element(dict: &Element, index: usize) -> Option<usize> {
    dict.children
        .iter()
        .enumerate()
        .skip(index + 1)
        .find(|(_, child)| matches!(child, Node::Element(_)))
        .map(|(i, _)| i)
}

/// The value element paired with `key`, if any
pub fn value_for<'a>(dict: &'a Element, key: &str) -> Option<&'a Element> {
    let key_index = find_key(dict, key)?;
    let value_index = next_element(dict, key_index)?;
    dict.children[value_index].as_element()
}

/// The string value under `key`, or `None` when absent or not a `<string>`
pub fn get_string(dict: &Element, key: &str) -> Option<String> {
    value_for(dict, key)
        .filter(|value| value.is("string"))
        .map(Element::text)
}

/// The string elements of the array under `key`
pub fn get_array(dict: &Element, key: &str) -> Option<Vec<String>> {
    value_for(dict, key).filter(|value| value.is("array")).map(|array| {
        array
            .elements()
            .filter(|element| element.is("string"))
            .map(Element::text)
            .collect()
    })
}

/// Set a string value under `key`
///
/// Absent key: a key/string pair is appended at the end of the dict. Present
/// key followed by a `<string>`: its text is overwritten in place. Present key
/// followed by anything else: a new `<string>` is inserted right after the key
/// and the old sibling stays where it is.
pub fn set_string(dict: &mut Element, key: &str, value: &str) -> EditOutcome {
    let Some(key_index) = find_key(dict, key) else {
        dict.children.push(Node::Element(Element::with_text("key", key)));
        dict.children
            .push(Node::Element(Element::with_text("string", value)));
        return EditOutcome::Inserted;
    };

    let existing = next_element(dict, key_index)
        .and_then(|index| dict.children[index].as_element_mut())
        .filter(|element| element.is("string"));

    match existing {
        Some(string) if string.text() == value => EditOutcome::Unchanged,
        Some(string) => {
            string.set_text(value);
            EditOutcome::Updated
        }
        None => {
            dict.children.insert(
                key_index + 1,
                Node::Element(Element::with_text("string", value)),
            );
            EditOutcome::Inserted
        }
    }
}

/// Add `value` to the string array under `key` unless it is already there
///
/// Absent key: a key/array pair is appended. Present key followed by an
/// `<array>`: the value is appended when no element equals it. Present key
/// followed by anything else: a new `<array>` is inserted right after the key.
pub fn add_array_element(dict: &mut Element, key: &str, value: &str) -> EditOutcome {
    let new_array = || Element::new("array").with_child(Element::with_text("string", value));

    let Some(key_index) = find_key(dict, key) else {
        dict.children.push(Node::Element(Element::with_text("key", key)));
        dict.children.push(Node::Element(new_array()));
        return EditOutcome::Inserted;
    };

    let existing = next_element(dict, key_index)
        .and_then(|index| dict.children[index].as_element_mut())
        .filter(|element| element.is("array"));

    match existing {
        Some(array) => {
            let present = array
                .elements()
                .any(|element| element.is("string") && element.text() == value);
            if present {
                EditOutcome::Unchanged
            } else {
                array
                    .children
                    .push(Node::Element(Element::with_text("string", value)));
                EditOutcome::Inserted
            }
        }
        None => {
            dict.children.insert(key_index + 1, Node::Element(new_array()));
            EditOutcome::Inserted
        }
    }
}
