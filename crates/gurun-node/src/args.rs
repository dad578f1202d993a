//! Call arguments and per-node keyword memory.
//!
//! Every invocation receives an [`Args`] value: a list of positional values
//! plus a map of keyword values.  A node's [`Memory`] holds keyword bindings
//! fixed at construction time which are merged into every call, with
//! call-time keywords taking precedence on key collision.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GurunError, Result};

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

/// Positional and keyword arguments for a single node invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Map<String, Value>,
}

impl Args {
    /// Empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single positional argument.
    pub fn single(value: impl Into<Value>) -> Self {
        Self {
            positional: vec![value.into()],
            keywords: Map::new(),
        }
    }

    /// Keyword arguments only, e.g. a spread mapping output.
    pub fn from_keywords(keywords: Map<String, Value>) -> Self {
        Self {
            positional: Vec::new(),
            keywords,
        }
    }

    /// Append a positional argument.
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Set a keyword argument, replacing any previous value for `key`.
    pub fn with_keyword(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keywords.insert(key.into(), value.into());
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keywords(&self) -> &Map<String, Value> {
        &self.keywords
    }

    /// Positional argument at `index`, if supplied.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument named `key`, if supplied.
    pub fn keyword(&self, key: &str) -> Option<&Value> {
        self.keywords.get(key)
    }

    /// `true` when neither positional nor keyword arguments are present.
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keywords.is_empty()
    }

    /// Deserialize the positional argument at `index` into `T`.
    pub fn arg_as<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self
            .positional
            .get(index)
            .ok_or(GurunError::MissingArgument { index })?;
        convert(format!("argument {index}"), value)
    }

    /// Deserialize the keyword argument `key` into `T`.
    pub fn keyword_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .keywords
            .get(key)
            .ok_or_else(|| GurunError::MissingKeyword { key: key.into() })?;
        convert(key.to_string(), value)
    }

    /// Split into the positional list and keyword map.
    pub fn into_parts(self) -> (Vec<Value>, Map<String, Value>) {
        (self.positional, self.keywords)
    }
}

impl From<Value> for Args {
    fn from(value: Value) -> Self {
        Self::single(value)
    }
}

fn convert<T: DeserializeOwned>(name: String, value: &Value) -> Result<T> {
    serde_json::from_value(value.clone()).map_err(|_| GurunError::InvalidArgument {
        name,
        expected: std::any::type_name::<T>().to_string(),
        received: value_kind(value).to_string(),
    })
}

/// JSON type name of `value`, used in argument error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Keyword bindings re-applied on every invocation of the owning node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memory(Map<String, Value>);

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key`, returning the previous binding if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Add every entry of `other`, overwriting existing bindings.
    pub fn extend(&mut self, other: Map<String, Value>) {
        self.0.extend(other);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Merge this memory into `args`.
    ///
    /// Positional arguments pass through unchanged.  A memory entry is only
    /// added when the call did not supply the same keyword.
    pub fn apply(&self, mut args: Args) -> Args {
        for (key, value) in &self.0 {
            if !args.keywords.contains_key(key) {
                args.keywords.insert(key.clone(), value.clone());
            }
        }
        args
    }
}

impl From<Map<String, Value>> for Memory {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Memory {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
