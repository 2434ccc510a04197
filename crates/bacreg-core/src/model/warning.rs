// ── Warning buckets ──
//
// Non-fatal problems are grouped by cause. A bucket is created on first
// occurrence and collects the offending identifiers after that.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DUPLICATE_ID: &str = "duplicate_id";
pub const DUPLICATE_ID_MESSAGE: &str =
    "Duplicate device IDs found. Your network may not be set up correctly.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub key: String,
    pub message: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warnings {
    buckets: IndexMap<String, Warning>,
}

impl Warnings {
    /// Record `item` under `key`, creating the bucket if needed.
    ///
    /// An item already in the bucket is not added twice.
    pub fn push(&mut self, key: &str, message: &str, item: impl Into<String>) {
        let bucket = self
            .buckets
            .entry(key.to_owned())
            .or_insert_with(|| Warning {
                key: key.to_owned(),
                message: message.to_owned(),
                items: Vec::new(),
            });

        let item = item.into();
        if !bucket.items.contains(&item) {
            bucket.items.push(item);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Warning> {
        self.buckets.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Warning> {
        self.buckets.values()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
