//! Free-form generation options with typed accessors for well-known keys.
//!
//! Options are an insertion-ordered `key → value` bag. Adapters hold a bag of
//! defaults and every call may carry its own bag; [`Options::merged`] combines
//! them with the per-call value winning on key collision.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const TEMPERATURE: &str = "temperature";
pub const MAX_TOKENS: &str = "max_tokens";
pub const TOP_P: &str = "top_p";
pub const TOP_K: &str = "top_k";
pub const SEED: &str = "seed";
pub const STOP: &str = "stop";
pub const STREAM: &str = "stream";

/// Ordered option bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options {
    values: Map<String, Value>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous value for the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder form of [`Options::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Combine `self` (defaults) with `overrides` (per call).
    ///
    /// Keys keep the position of their first appearance; on collision the
    /// override's value wins.
    pub fn merged(&self, overrides: &Options) -> Options {
        let mut values = self.values.clone();
        for (key, value) in &overrides.values {
            values.insert(key.clone(), value.clone());
        }
        Options { values }
    }

    pub fn temperature(&self) -> Option<f64> {
        self.get(TEMPERATURE).and_then(Value::as_f64)
    }

    pub fn max_tokens(&self) -> Option<u64> {
        self.get(MAX_TOKENS).and_then(Value::as_u64)
    }

    pub fn top_p(&self) -> Option<f64> {
        self.get(TOP_P).and_then(Value::as_f64)
    }

    pub fn top_k(&self) -> Option<u64> {
        self.get(TOP_K).and_then(Value::as_u64)
    }

    pub fn seed(&self) -> Option<i64> {
        self.get(SEED).and_then(Value::as_i64)
    }

    /// Stop sequences; a single string is treated as a one-element list.
    pub fn stop(&self) -> Option<Vec<String>> {
        match self.get(STOP)? {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(items) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn stream(&self) -> bool {
        self.get(STREAM).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Entries whose key is not one of the well-known sampling keys.
    pub fn extras(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter().filter(|(key, _)| !is_well_known(key))
    }

    pub(crate) fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

fn is_well_known(key: &str) -> bool {
    matches!(
        key,
        TEMPERATURE | MAX_TOKENS | TOP_P | TOP_K | SEED | STOP | STREAM
    )
}

/// Global generation defaults used to seed an adapter's option bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u64>,
    pub seed: Option<i64>,
}

impl GenerationDefaults {
    /// Options holding only the values that are present.
    pub fn to_options(&self) -> Options {
        let mut options = Options::new();
        if let Some(temperature) = self.temperature {
            options.set(TEMPERATURE, temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            options.set(MAX_TOKENS, max_tokens);
        }
        if let Some(seed) = self.seed {
            options.set(SEED, seed);
        }
        options
    }
}
