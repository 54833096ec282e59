//! Memory Entry - The fundamental unit handed to consolidation
//!
//! Each entry is a key/value record inside a namespace. The value is either
//! plain text or a structured JSON document; consolidation only ever looks at
//! its text form.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use super::MemoryCategory;

// ============================================================================
// MEMORY VALUE
// ============================================================================

/// Payload of a memory entry
///
/// Deserialized untagged: a JSON string becomes `Text`, any other JSON value
/// becomes `Structured`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryValue {
    /// UTF-8 text blob
    Text(String),
    /// Structured record kept as JSON
    Structured(serde_json::Value),
}

impl MemoryValue {
    /// Text representation used for embedding and comparison
    ///
    /// Structured values are rendered as compact JSON, so two records with the
    /// same fields in the same order compare as identical text.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            MemoryValue::Text(s) => Cow::Borrowed(s),
            MemoryValue::Structured(serde_json::Value::String(s)) => Cow::Borrowed(s),
            MemoryValue::Structured(v) => Cow::Owned(v.to_string()),
        }
    }

    /// Whether the payload is plain text
    pub fn is_text(&self) -> bool {
        matches!(self, MemoryValue::Text(_))
    }
}

impl From<String> for MemoryValue {
    fn from(s: String) -> Self {
        MemoryValue::Text(s)
    }
}

impl From<&str> for MemoryValue {
    fn from(s: &str) -> Self {
        MemoryValue::Text(s.to_string())
    }
}

impl From<serde_json::Value> for MemoryValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::String(s) => MemoryValue::Text(s),
            other => MemoryValue::Structured(other),
        }
    }
}

// ============================================================================
// ENTRY METADATA
// ============================================================================

/// Metadata attached to a memory entry
///
/// Deserialization never fails on content: `null` or a non-object reads as
/// empty metadata, and a `timestamp` or `category` that cannot be read stays
/// in `extra` untouched, so the entry loads as undated or uncategorised.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Creation / last-write time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Retention category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<MemoryCategory>,
    /// Any other metadata fields, preserved untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntryMetadata {
    /// Metadata stamped with the current wall-clock time
    pub fn now() -> Self {
        Self {
            timestamp: Some(Utc::now().timestamp_millis()),
            ..Default::default()
        }
    }

    /// Metadata with an explicit timestamp
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: MemoryCategory) -> Self {
        self.category = Some(category);
        self.extra.remove("category");
        self
    }

    /// Set the timestamp, replacing any unreadable raw value
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = Some(timestamp);
        self.extra.remove("timestamp");
    }

    fn from_fields(mut extra: BTreeMap<String, serde_json::Value>) -> Self {
        let timestamp = match extra.remove("timestamp") {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => match raw.as_i64() {
                Some(ts) => Some(ts),
                None => {
                    tracing::warn!(
                        timestamp = %raw,
                        "Unreadable entry timestamp; keeping it as an extra field"
                    );
                    extra.insert("timestamp".to_string(), raw);
                    None
                }
            },
        };

        let category = match extra.remove("category") {
            None | Some(serde_json::Value::Null) => None,
            Some(raw) => match raw.as_str().map(str::parse::<MemoryCategory>) {
                Some(Ok(category)) => Some(category),
                _ => {
                    tracing::warn!(
                        category = %raw,
                        "Unreadable entry category; keeping it as an extra field"
                    );
                    extra.insert("category".to_string(), raw);
                    None
                }
            },
        };

        Self {
            timestamp,
            category,
            extra,
        }
    }
}

impl<'de> Deserialize<'de> for EntryMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Object(fields) => {
                Ok(Self::from_fields(fields.into_iter().collect()))
            }
            serde_json::Value::Null => Ok(Self::default()),
            other => {
                tracing::warn!(metadata = %other, "Entry metadata is not an object; ignoring it");
                Ok(Self::default())
            }
        }
    }
}

// ============================================================================
// MEMORY ENTRY
// ============================================================================

/// A key/value memory record inside a namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    /// Unique key within the namespace
    pub key: String,
    /// Payload
    pub value: MemoryValue,
    /// Logical partition
    #[serde(default)]
    pub namespace: String,
    /// Timestamp, category, and free-form metadata
    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl MemoryEntry {
    /// Create an entry stamped with the current time
    pub fn new(
        key: impl Into<String>,
        value: impl Into<MemoryValue>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            namespace: namespace.into(),
            metadata: EntryMetadata::now(),
        }
    }

    /// Replace the timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.metadata.set_timestamp(timestamp);
        self
    }

    /// Drop the timestamp (malformed record)
    pub fn without_timestamp(mut self) -> Self {
        self.metadata.timestamp = None;
        self
    }

    /// Replace the category
    pub fn with_category(mut self, category: MemoryCategory) -> Self {
        self.metadata = self.metadata.with_category(category);
        self
    }

    /// Text form of the value
    pub fn text(&self) -> Cow<'_, str> {
        self.value.as_text()
    }

    /// Timestamp, if the record carries one
    pub fn timestamp(&self) -> Option<i64> {
        self.metadata.timestamp
    }

    /// Category used for TTL lookup
    ///
    /// Resolution order: explicit `metadata.category`, then the key prefix
    /// before the first `/` (`task/build-42` resolves to `task`), then the
    /// namespace. Returns `None` when none of these yield a name.
    pub fn resolved_category(&self) -> Option<MemoryCategory> {
        if let Some(category) = &self.metadata.category {
            return Some(category.clone());
        }

        if let Some((prefix, _)) = self.key.split_once('/') {
            if let Ok(category) = prefix.parse() {
                return Some(category);
            }
        }

        self.namespace.parse().ok()
    }
}
