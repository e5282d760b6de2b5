//! Field access over one raw record.
//!
//! A [`RecordReader`] wraps a JSON object, remembers which members were
//! read and collects every field-level problem instead of stopping at the
//! first. Loaders read everything they understand, then ask the reader for
//! the problem list and the members nobody looked at.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use stockpile_core::units::{Length, Mass, UnitError, Volume};

/// Members every record may carry that no field loader consumes.
pub const META_KEYS: &[&str] = &["type", "src", "//", "//2", "comment", "description_note"];

pub struct RecordReader<'a> {
    obj: &'a Map<String, Value>,
    /// Path prefix used in problem messages for nested objects.
    prefix: String,
    visited: BTreeSet<&'a str>,
    /// Unread members of absorbed nested readers, as full paths.
    unread_nested: Vec<String>,
    problems: Vec<String>,
}

impl<'a> RecordReader<'a> {
    pub fn new(obj: &'a Map<String, Value>) -> Self {
        let mut reader = Self {
            obj,
            prefix: String::new(),
            visited: BTreeSet::new(),
            unread_nested: Vec::new(),
            problems: Vec::new(),
        };
        for key in META_KEYS {
            reader.mark(key);
        }
        reader
    }

    fn nested_at(obj: &'a Map<String, Value>, prefix: String) -> Self {
        Self {
            obj,
            prefix,
            visited: BTreeSet::new(),
            unread_nested: Vec::new(),
            problems: Vec::new(),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }

    /// Record a problem about `key`.
    pub fn problem(&mut self, key: &str, detail: impl std::fmt::Display) {
        let path = self.path(key);
        self.problems.push(format!("field '{path}': {detail}"));
    }

    /// Record a problem not tied to a single member.
    pub fn record_problem(&mut self, detail: impl Into<String>) {
        self.problems.push(detail.into());
    }

    /// Mark a member as understood without reading it.
    pub fn mark(&mut self, key: &str) {
        if let Some((k, _)) = self.obj.get_key_value(key) {
            self.visited.insert(k.as_str());
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.obj.contains_key(key)
    }

    /// The raw member, marking it visited.
    pub fn value(&mut self, key: &str) -> Option<&'a Value> {
        let (k, v) = self.obj.get_key_value(key)?;
        self.visited.insert(k.as_str());
        Some(v)
    }

    /// Deserialize a member. Shape errors are recorded and yield `None`.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let v = self.value(key)?;
        match T::deserialize(v) {
            Ok(t) => Some(t),
            Err(e) => {
                self.problem(key, e);
                None
            }
        }
    }

    /// Overwrite `target` if the member is present and well-formed.
    pub fn read<T: DeserializeOwned>(&mut self, key: &str, target: &mut T) {
        if let Some(v) = self.get(key) {
            *target = v;
        }
    }

    /// Overwrite an optional `target` if the member is present.
    pub fn read_opt<T: DeserializeOwned>(&mut self, key: &str, target: &mut Option<T>) {
        if let Some(v) = self.get(key) {
            *target = Some(v);
        }
    }

    pub fn string(&mut self, key: &str) -> Option<String> {
        self.get(key)
    }

    pub fn bool_or(&mut self, key: &str, default: bool) -> bool {
        self.get(key).unwrap_or(default)
    }

    /// A single string or a list of strings.
    pub fn string_list(&mut self, key: &str) -> Option<Vec<String>> {
        match self.value(key)? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        other => {
                            self.problem(key, format!("expected a string, found {other}"));
                            return None;
                        }
                    }
                }
                Some(out)
            }
            other => {
                self.problem(key, format!("expected a string or list, found {other}"));
                None
            }
        }
    }

    /// A nested object member.
    pub fn object(&mut self, key: &str) -> Option<&'a Map<String, Value>> {
        match self.value(key)? {
            Value::Object(map) => Some(map),
            other => {
                self.problem(key, format!("expected an object, found {other}"));
                None
            }
        }
    }

    /// A reader over a nested object member. Merge it back with
    /// [`RecordReader::absorb`].
    pub fn nested(&mut self, key: &str) -> Option<RecordReader<'a>> {
        let obj = self.object(key)?;
        let prefix = self.path(key);
        Some(Self::nested_at(obj, prefix))
    }

    /// A reader over an arbitrary object, reporting under `label`.
    pub fn child(&self, obj: &'a Map<String, Value>, label: &str) -> RecordReader<'a> {
        Self::nested_at(obj, self.path(label))
    }

    /// Take over a nested reader's problems and unread members.
    pub fn absorb(&mut self, child: RecordReader<'a>) {
        for key in child.unvisited() {
            self.unread_nested.push(child.path(key));
        }
        self.unread_nested.extend(child.unread_nested);
        self.problems.extend(child.problems);
    }

    // -----------------------------------------------------------------------
    // Units
    // -----------------------------------------------------------------------

    fn unit<T>(
        &mut self,
        key: &str,
        from_int: fn(i64) -> T,
        parse: fn(&str) -> Result<T, UnitError>,
    ) -> Option<T> {
        match self.value(key)? {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(from_int(i)),
                None => {
                    self.problem(key, format!("'{n}' is not a whole number"));
                    None
                }
            },
            Value::String(s) => match parse(s) {
                Ok(t) => Some(t),
                Err(e) => {
                    self.problem(key, e);
                    None
                }
            },
            other => {
                self.problem(key, format!("expected a quantity, found {other}"));
                None
            }
        }
    }

    pub fn mass(&mut self, key: &str) -> Option<Mass> {
        self.unit(key, Mass, Mass::parse)
    }

    pub fn volume(&mut self, key: &str) -> Option<Volume> {
        self.unit(key, Volume, Volume::parse)
    }

    pub fn length(&mut self, key: &str) -> Option<Length> {
        self.unit(key, Length, Length::parse)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Members present but never read.
    pub fn unvisited(&self) -> Vec<&'a str> {
        self.obj
            .keys()
            .map(String::as_str)
            .filter(|k| !self.visited.contains(k))
            .collect()
    }

    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }

    /// Consume the reader, returning its problems. Unread members become
    /// problems when `strict`, otherwise they are logged at debug.
    pub fn finish(mut self, owner: &str, strict: bool) -> Vec<String> {
        let mut unread: Vec<String> = self.unvisited().into_iter().map(|k| self.path(k)).collect();
        unread.append(&mut self.unread_nested);
        if strict {
            for path in unread {
                self.problems.push(format!("field '{path}': not a recognized member"));
            }
        } else if !unread.is_empty() {
            log::debug!("'{owner}': ignored members {}", unread.join(", "));
        }
        self.problems
    }
}

// ===========================================================================
// Tests
// ===========================================================================
