// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class label set (class index -> label string)
//!
//! Loaded once at startup, either from a plain text file (one label per line)
//! or from the `names` metadata entry that Ultralytics writes into exported
//! ONNX models, e.g. `{0: '5', 1: 'NULL', 2: 'JOK'}`.

use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LabelSetError {
    #[error("Failed to read label file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Label set is empty")]
    Empty,

    #[error("Invalid names metadata: {0}")]
    InvalidMetadata(String),
}

/// Immutable mapping from class index to label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassLabelSet {
    names: Vec<String>,
}

impl ClassLabelSet {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Load labels from a text file, one label per line in class order
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, LabelSetError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| LabelSetError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_lines(&content)
    }

    /// Parse newline-separated labels; blank lines are ignored
    pub fn from_lines(content: &str) -> Result<Self, LabelSetError> {
        let names: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            return Err(LabelSetError::Empty);
        }
        Ok(Self { names })
    }

    /// Parse the Ultralytics `names` metadata dictionary
    ///
    /// Indices missing from the dictionary resolve to their decimal string.
    pub fn from_ultralytics_names(metadata: &str) -> Result<Self, LabelSetError> {
        let entries = parse_names(metadata)?;
        if entries.is_empty() {
            return Err(LabelSetError::Empty);
        }

        let len = entries.keys().next_back().map(|max| max + 1).unwrap_or(0);
        let names = (0..len)
            .map(|i| entries.get(&i).cloned().unwrap_or_else(|| i.to_string()))
            .collect();
        Ok(Self { names })
    }

    /// Label for a class index; unknown indices fall back to the index itself
    pub fn label(&self, class_index: usize) -> Cow<'_, str> {
        match self.names.get(class_index) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(class_index.to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// `int: 'str'` / `int: "str"` pairs of a Python dict repr
fn names_entry_regex() -> &'static Regex {
    static NAMES_ENTRY_RE: OnceLock<Regex> = OnceLock::new();
    NAMES_ENTRY_RE.get_or_init(|| {
        Regex::new(r#"(\d+)\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#).unwrap()
    })
}

fn parse_names(metadata: &str) -> Result<BTreeMap<usize, String>, LabelSetError> {
    let body = metadata
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| {
            LabelSetError::InvalidMetadata("expected a '{...}' dictionary".to_string())
        })?;

    let mut entries = BTreeMap::new();
    for caps in names_entry_regex().captures_iter(body) {
        let index = caps[1]
            .parse::<usize>()
            .map_err(|e| LabelSetError::InvalidMetadata(format!("bad class index: {}", e)))?;
        let raw = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        entries.insert(index, unescape(raw));
    }
    Ok(entries)
}

/// Drop the backslash from `\x` escapes
fn unescape(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => value.extend(chars.next()),
            c => value.push(c),
        }
    }
    value
}
