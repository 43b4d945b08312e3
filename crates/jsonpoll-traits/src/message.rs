//! Decoded client message batches.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A batch of client messages decoded from a single send request.
///
/// The transport never interprets message contents; the batch carries the
/// decoded JSON value exactly as the client sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageBatch(Value);

impl MessageBatch {
    /// Wrap an already decoded JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Decode a batch from its JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text).map(Self)
    }

    /// The batch exactly as decoded.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Number of messages this batch delivers.
    pub fn len(&self) -> usize {
        match &self.0 {
            Value::Array(items) => items.len(),
            _ => 1,
        }
    }

    /// Whether the batch delivers no messages at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split the batch into individual messages.
    ///
    /// An array yields its elements in order; any other value is a
    /// single-message batch.
    pub fn into_messages(self) -> Vec<Value> {
        match self.0 {
            Value::Array(items) => items,
            other => vec![other],
        }
    }
}

impl From<Value> for MessageBatch {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
