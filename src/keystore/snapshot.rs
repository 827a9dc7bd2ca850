//! Immutable store contents
//!
//! A `Snapshot` is never modified after it is published. Writers build a new
//! one that shares every untouched `Entry` with its predecessor.

use crate::crypto::{KeyAlgorithm, PrivateKey, PublicKey};
use std::collections::HashMap;
use std::sync::Arc;

/// Key material stored under one identifier
///
/// At least one side is always present.
#[derive(Debug, Clone)]
pub struct Entry {
    private_key: Option<Arc<PrivateKey>>,
    public_key: Option<Arc<PublicKey>>,
    updated_at: i64,
}

impl Entry {
    pub(crate) fn new(
        private_key: Option<Arc<PrivateKey>>,
        public_key: Option<Arc<PublicKey>>,
    ) -> Self {
        Self {
            private_key,
            public_key,
            updated_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn private_key(&self) -> Option<&Arc<PrivateKey>> {
        self.private_key.as_ref()
    }

    pub fn public_key(&self) -> Option<&Arc<PublicKey>> {
        self.public_key.as_ref()
    }

    /// Unix timestamp of the write that produced this entry
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn algorithm(&self) -> Option<KeyAlgorithm> {
        match (&self.public_key, &self.private_key) {
            (Some(public_key), _) => Some(public_key.algorithm()),
            (None, Some(private_key)) => Some(private_key.algorithm()),
            (None, None) => None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.private_key.is_none() && self.public_key.is_none()
    }
}

/// Identifier to entry mapping at one point in time
#[derive(Debug, Default)]
pub struct Snapshot {
    entries: HashMap<String, Arc<Entry>>,
}

impl Snapshot {
    pub fn get(&self, id: &str) -> Option<&Arc<Entry>> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Entry>)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Copy of this snapshot with `entry` stored under `id`
    ///
    /// Other entries are shared by reference, not cloned.
    pub(crate) fn with_entry(&self, id: &str, entry: Entry) -> Snapshot {
        let mut entries = HashMap::with_capacity(self.entries.len() + 1);
        entries.extend(
            self.entries
                .iter()
                .map(|(id, entry)| (id.clone(), Arc::clone(entry))),
        );
        entries.insert(id.to_string(), Arc::new(entry));
        Snapshot { entries }
    }
}
