//! Paths touched by a deploy, in the encoded form the CDN expects.

use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in a key segment: everything but unreserved characters.
/// Spaces are kept here and turned into `+` afterwards.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b' ');

/// Encode an object key as an absolute CDN path, escaping each segment.
pub fn encode_key(key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string().replace(' ', "+"))
        .collect::<Vec<_>>()
        .join("/");
    format!("/{encoded}")
}

/// For keys ending in the index filename, the directory path serving the same page.
pub fn directory_form(encoded: &str, index_file: &str) -> Option<String> {
    encoded
        .strip_suffix(index_file)
        .filter(|dir| dir.ends_with('/'))
        .map(str::to_string)
}

/// Insertion-ordered set of distinct paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path; returns false when it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if !self.seen.insert(path.clone()) {
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Add the encoded key and, for index pages, its directory form.
    pub fn insert_key(&mut self, key: &str, index_file: &str) {
        let encoded = encode_key(key);
        if let Some(dir) = directory_form(&encoded, index_file) {
            self.insert(encoded);
            self.insert(dir);
        } else {
            self.insert(encoded);
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.seen.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.paths.clone()
    }
}
