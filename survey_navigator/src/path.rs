//! Dotted paths into the interview response tree, and the declarative update
//! batches that the engine hands back to the host.
//!
//! The engine never mutates a response tree. Every structural repair is
//! returned as an [`UpdateBatch`] whose keys are full paths from the interview
//! object (`responses.household.persons.<uuid>...`), to be applied atomically
//! by the interview update service.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Root field of the interview object under which all responses live.
pub const RESPONSES: &str = "responses";

/// A path into the responses, stored as its segments.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Default, PartialOrd, Ord)]
pub struct ResponsePath {
    parts: Vec<String>,
}

impl ResponsePath {
    pub fn root() -> ResponsePath {
        ResponsePath { parts: Vec::new() }
    }

    /// Splits a dot-separated path. Empty segments are dropped.
    pub fn parse(path: &str) -> ResponsePath {
        ResponsePath {
            parts: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// `household.persons`
    pub fn persons() -> ResponsePath {
        ResponsePath::parse("household.persons")
    }

    /// `household.persons.<person_id>`
    pub fn person(person_id: &str) -> ResponsePath {
        ResponsePath::persons().join(person_id)
    }

    pub fn visited_places(&self) -> ResponsePath {
        self.join("visitedPlaces")
    }

    pub fn visited_place(&self, visited_place_id: &str) -> ResponsePath {
        self.visited_places().join(visited_place_id)
    }

    pub fn trips(&self) -> ResponsePath {
        self.join("trips")
    }

    pub fn trip(&self, trip_id: &str) -> ResponsePath {
        self.trips().join(trip_id)
    }

    pub fn segments(&self) -> ResponsePath {
        self.join("segments")
    }

    pub fn segment(&self, segment_id: &str) -> ResponsePath {
        self.segments().join(segment_id)
    }

    /// Appends a field, which may itself be dotted.
    pub fn join(&self, field: &str) -> ResponsePath {
        let mut parts = self.parts.clone();
        parts.extend(ResponsePath::parse(field).parts);
        ResponsePath { parts }
    }

    pub fn parent(&self) -> Option<ResponsePath> {
        if self.parts.is_empty() {
            return None;
        }
        Some(ResponsePath {
            parts: self.parts[..self.parts.len() - 1].to_vec(),
        })
    }

    /// The last segment, usually the uuid of the record the path points to.
    pub fn last(&self) -> Option<&str> {
        self.parts.last().map(|s| s.as_str())
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    /// The key of this path in an update batch: `responses.<path>`.
    pub fn response_key(&self) -> String {
        if self.is_root() {
            RESPONSES.to_string()
        } else {
            format!("{}.{}", RESPONSES, self)
        }
    }

    /// Resolves a relative path against this one.
    ///
    /// The relative path starts with one or more `../`, each going back one
    /// segment, and ends with the dotted path to append. For example
    /// `foo.bar.test` with `../../myField` gives `foo.myField`.
    ///
    /// Returns `None` when the relative path does not go backward, walks past
    /// the root, or resolves to the root itself.
    pub fn resolve_relative(&self, relative: &str) -> Option<ResponsePath> {
        let mut rest = relative;
        let mut backward_count = 0;
        while let Some(r) = rest.strip_prefix("../") {
            backward_count += 1;
            rest = r;
        }
        if rest == ".." {
            backward_count += 1;
            rest = "";
        }
        if backward_count == 0 {
            debug!(
                "resolve_relative: {:?} does not go backward from {}",
                relative, self
            );
            return None;
        }
        if backward_count > self.parts.len() {
            debug!(
                "resolve_relative: {:?} walks past the root of {}",
                relative, self
            );
            return None;
        }
        let mut parts = self.parts[..self.parts.len() - backward_count].to_vec();
        parts.extend(ResponsePath::parse(rest).parts);
        if parts.is_empty() {
            None
        } else {
            Some(ResponsePath { parts })
        }
    }
}

impl Display for ResponsePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("."))
    }
}

impl From<&str> for ResponsePath {
    fn from(path: &str) -> Self {
        ResponsePath::parse(path)
    }
}

/// Gets the value at `path` in `tree`. Missing segments, non-container
/// intermediate values and `null` all give `None`.
pub fn get<'a>(tree: &'a JSValue, path: &ResponsePath) -> Option<&'a JSValue> {
    let mut cur = tree;
    for part in path.parts.iter() {
        cur = match cur {
            JSValue::Object(m) => m.get(part)?,
            JSValue::Array(a) => a.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if cur.is_null() {
        None
    } else {
        Some(cur)
    }
}

/// Same as [`get`], with a default when the value is missing.
pub fn get_or<'a>(tree: &'a JSValue, path: &ResponsePath, default: &'a JSValue) -> &'a JSValue {
    get(tree, path).unwrap_or(default)
}

/// Gets a value from a path relative to `path` (see
/// [`ResponsePath::resolve_relative`]).
pub fn get_relative<'a>(
    tree: &'a JSValue,
    path: &ResponsePath,
    relative: &str,
) -> Option<&'a JSValue> {
    let resolved = path.resolve_relative(relative)?;
    get(tree, &resolved)
}

// ******** Update batches *********

/// The set of changes to commit to an interview.
///
/// Keys are full paths from the interview object, so the batch can also carry
/// non-response fields. Setting the same path twice keeps the last value.
#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBatch {
    #[serde(rename = "valuesByPath")]
    pub values_by_path: BTreeMap<String, JSValue>,
    #[serde(rename = "unsetPaths")]
    pub unset_paths: Vec<String>,
}

impl UpdateBatch {
    pub fn new() -> UpdateBatch {
        UpdateBatch::default()
    }

    /// Sets the response at `path`.
    pub fn set<V: Into<JSValue>>(&mut self, path: &ResponsePath, value: V) {
        self.values_by_path.insert(path.response_key(), value.into());
    }

    /// Sets an arbitrary key of the interview object.
    pub fn set_key<V: Into<JSValue>>(&mut self, key: &str, value: V) {
        self.values_by_path.insert(key.to_string(), value.into());
    }

    /// Removes the response at `path`.
    pub fn unset(&mut self, path: &ResponsePath) {
        let key = path.response_key();
        if !self.unset_paths.contains(&key) {
            self.unset_paths.push(key);
        }
    }

    /// Adds the content of another batch. Values of `other` win.
    pub fn merge(&mut self, other: UpdateBatch) {
        self.values_by_path.extend(other.values_by_path);
        for key in other.unset_paths {
            if !self.unset_paths.contains(&key) {
                self.unset_paths.push(key);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values_by_path.is_empty() && self.unset_paths.is_empty()
    }

    /// The value this batch sets for the response at `path`, if any.
    pub fn value(&self, path: &ResponsePath) -> Option<&JSValue> {
        self.values_by_path.get(&path.response_key())
    }

    pub fn is_unset(&self, path: &ResponsePath) -> bool {
        self.unset_paths.contains(&path.response_key())
    }

    /// Applies the batch to an interview object: values first, then unsets.
    ///
    /// Intermediate objects are created as needed. The engine itself never
    /// calls this; it is provided to hosts that keep interviews in memory.
    pub fn apply(&self, interview: &mut JSValue) {
        for (key, value) in self.values_by_path.iter() {
            let p = ResponsePath::parse(key);
            set_in(interview, p.parts(), value.clone());
        }
        for key in self.unset_paths.iter() {
            let p = ResponsePath::parse(key);
            unset_in(interview, p.parts());
        }
    }
}

fn set_in(tree: &mut JSValue, parts: &[String], value: JSValue) {
    match parts {
        [] => *tree = value,
        [head, rest @ ..] => {
            if !tree.is_object() {
                *tree = JSValue::Object(JSMap::new());
            }
            if let JSValue::Object(m) = tree {
                let child = m.entry(head.clone()).or_insert(JSValue::Null);
                set_in(child, rest, value);
            }
        }
    }
}

fn unset_in(tree: &mut JSValue, parts: &[String]) {
    match parts {
        [] => {}
        [last] => {
            if let JSValue::Object(m) = tree {
                m.remove(last);
            }
        }
        [head, rest @ ..] => {
            if let Some(child) = tree.as_object_mut().and_then(|m| m.get_mut(head)) {
                unset_in(child, rest);
            }
        }
    }
}
