//! Shared key/value bag threaded through a pipeline run.

use std::collections::HashMap;

use serde_json::Value;

/// A string-keyed bag of JSON values passed between pipeline steps.
///
/// Each step reads whatever prior steps have contributed and returns its own
/// additions in its [`crate::PipelineResult`]; the pipeline merges those
/// additions into the running context before the next step runs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PipelineContext {
    values: HashMap<String, Value>,
}

impl PipelineContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a value under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Returns the value stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns `true` if `key` has been set.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Merges `other` into `self`, with `other`'s values taking precedence
    /// on key collision.
    pub fn merge(&mut self, other: PipelineContext) {
        self.values.extend(other.values);
    }

    /// Returns an iterator over the stored key/value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_prefers_incoming_values() {
        let mut base = PipelineContext::new();
        base.insert("a", json!(1));
        base.insert("b", json!(2));

        let mut incoming = PipelineContext::new();
        incoming.insert("b", json!(20));
        incoming.insert("c", json!(3));

        base.merge(incoming);

        assert_eq!(base.get("a"), Some(&json!(1)));
        assert_eq!(base.get("b"), Some(&json!(20)));
        assert_eq!(base.get("c"), Some(&json!(3)));
    }
}
