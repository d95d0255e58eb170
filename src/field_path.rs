//! Nested field access
//!
//! Records are JSON-like maps. A `FieldPath` addresses a value through an
//! ordered sequence of keys and is parsed once, from dotted text such as
//! `"request.client.ip"`, when the enricher is configured.
//!
//! Reads and writes are deliberately asymmetric:
//! - `FieldWriter::get` is strict and fails on any absent or non-map level.
//! - `FieldWriter::set` creates missing levels, only fails when an existing
//!   level is not a map, and never clobbers an existing final value unless
//!   collision prefixing is disabled.

use crate::error::{EnrichError, Result};
use serde_json::{Map, Value};
use std::fmt;

/// An enrichment record
pub type Record = Map<String, Value>;

/// Non-empty sequence of keys into a nested record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path
    pub fn parse(dotted: &str) -> Result<Self> {
        Self::from_segments(dotted.split('.'))
    }

    /// Build a path from individual keys
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(EnrichError::Config("empty field path".to_string()));
        }
        if let Some(pos) = segments.iter().position(|s| s.is_empty()) {
            return Err(EnrichError::Config(format!(
                "field path {:?} has an empty key at position {}",
                segments.join("."),
                pos
            )));
        }
        Ok(Self { segments })
    }

    /// All keys, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Final key
    pub fn last(&self) -> &str {
        // Never empty, see from_segments
        &self.segments[self.segments.len() - 1]
    }

    /// Keys leading to the final one
    pub fn parent(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Path formed by appending `key` to `base`
    pub fn join(base: &[String], key: &str) -> Self {
        let mut segments = base.to_vec();
        segments.push(key.to_string());
        Self { segments }
    }

    fn prefix_string(&self, len: usize) -> String {
        self.segments[..len].join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Reads source values and writes derived values into records
#[derive(Debug, Clone, Default)]
pub struct FieldWriter {
    /// Prefix for renamed keys on collision; `None` overwrites instead
    collision_prefix: Option<String>,
}

impl FieldWriter {
    /// Writer that renames a colliding key to `<source_key>_<key>`
    pub fn with_prefix(source_key: &str) -> Self {
        Self {
            collision_prefix: Some(source_key.to_string()),
        }
    }

    /// Writer that always overwrites
    pub fn overwriting() -> Self {
        Self::default()
    }

    /// Prefix used on collision, if any
    pub fn collision_prefix(&self) -> Option<&str> {
        self.collision_prefix.as_deref()
    }

    /// Strictly read the value at `path`
    pub fn get<'r>(&self, record: &'r Record, path: &FieldPath) -> Result<&'r Value> {
        let mut curr = record;
        for (i, key) in path.parent().iter().enumerate() {
            curr = match curr.get(key) {
                Some(Value::Object(map)) => map,
                Some(_) => return Err(EnrichError::WrongShape(path.prefix_string(i + 1))),
                None => return Err(EnrichError::MissingKey(path.prefix_string(i + 1))),
            };
        }
        curr.get(path.last())
            .ok_or_else(|| EnrichError::MissingKey(path.to_string()))
    }

    /// Leniently write `value` at `path`
    ///
    /// Missing intermediate levels are created. When the final key already
    /// holds a different value and a collision prefix is set, the value goes
    /// to `<prefix>_<final key>` instead; an equal value is left untouched.
    pub fn set(&self, record: &mut Record, value: Value, path: &FieldPath) -> Result<()> {
        let mut curr = record;
        for (i, key) in path.parent().iter().enumerate() {
            curr = match curr
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()))
            {
                Value::Object(map) => map,
                _ => return Err(EnrichError::WrongShape(path.prefix_string(i + 1))),
            };
        }

        let last = path.last();
        let key = match (curr.get(last), &self.collision_prefix) {
            (Some(existing), _) if *existing == value => return Ok(()),
            (Some(_), Some(prefix)) => format!("{}_{}", prefix, last),
            _ => last.to_string(),
        };
        curr.insert(key, value);
        Ok(())
    }
}
