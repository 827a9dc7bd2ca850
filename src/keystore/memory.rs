//! In-memory key store
//!
//! Reads load the current `Snapshot` through an `ArcSwap` and never take a
//! lock. Writers serialize on a mutex, copy the top-level map, and publish the
//! copy with a single atomic store, so a reader sees either the complete
//! state before a write or the complete state after it.
//!
//! Each write costs O(n) in the number of ids. The store is meant for small
//! to moderate key sets that are read far more often than written.

use crate::config::StoreConfig;
use crate::crypto::{KeyAlgorithm, PrivateKey, PublicKey};
use crate::errors::{KeyCacheError, Result};
use crate::keystore::snapshot::{Entry, Snapshot};
use crate::keystore::{Context, KeyStore};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Metadata about a stored key
#[derive(Debug, Clone, Serialize)]
pub struct KeyInfo {
    pub key_id: String,
    pub algorithm: KeyAlgorithm,
    pub has_private_key: bool,
    pub has_public_key: bool,
    pub fingerprint: Option<String>,
    pub updated_at: i64,
}

/// In-memory key store
pub struct MemoryKeyStore {
    /// Currently published snapshot
    snapshot: ArcSwap<Snapshot>,
    /// Serializes writers; readers never touch it
    write_lock: Mutex<()>,
    config: StoreConfig,
}

impl MemoryKeyStore {
    /// Create a new empty key store
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a new empty key store with custom limits
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            write_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The currently published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Check if anything is stored under an id
    pub fn contains(&self, key_id: &str) -> bool {
        self.snapshot.load().get(key_id).is_some()
    }

    /// Get the number of stored ids
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().is_empty()
    }

    /// Get key info
    pub fn key_info(&self, key_id: &str) -> Result<Option<KeyInfo>> {
        let snapshot = self.snapshot.load();
        snapshot
            .get(key_id)
            .map(|entry| describe(key_id, entry))
            .transpose()
    }

    /// List all stored keys, ordered by id
    pub fn list_keys(&self) -> Result<Vec<KeyInfo>> {
        let snapshot = self.snapshot.load();
        let mut infos = snapshot
            .iter()
            .map(|(key_id, entry)| describe(key_id, entry))
            .collect::<Result<Vec<_>>>()?;
        infos.sort_by(|a, b| a.key_id.cmp(&b.key_id));
        Ok(infos)
    }

    fn lookup(&self, key_id: &str) -> Result<Option<Arc<Entry>>> {
        let snapshot = self.snapshot.load();
        match snapshot.get(key_id) {
            Some(entry) if entry.is_empty() => Err(KeyCacheError::InternalError(format!(
                "entry {} holds no key material",
                key_id
            ))),
            Some(entry) => Ok(Some(Arc::clone(entry))),
            None => Ok(None),
        }
    }

    fn validate_id(&self, key_id: &str) -> Result<()> {
        if key_id.is_empty() {
            return Err(KeyCacheError::InvalidInput(
                "key id must not be empty".to_string(),
            ));
        }
        if key_id.len() > self.config.max_id_len {
            return Err(KeyCacheError::InvalidInput(format!(
                "key id is {} bytes, limit is {}",
                key_id.len(),
                self.config.max_id_len
            )));
        }
        Ok(())
    }

    fn validate_algorithm(&self, algorithm: KeyAlgorithm) -> Result<()> {
        if let KeyAlgorithm::Rsa { bits } = algorithm {
            if bits < self.config.min_rsa_bits {
                return Err(KeyCacheError::InvalidInput(format!(
                    "RSA key has {} bits, minimum is {}",
                    bits, self.config.min_rsa_bits
                )));
            }
        }
        Ok(())
    }

    /// Build and publish a new snapshot with the entry for `key_id` replaced
    ///
    /// `update` sees the current entry, if any. Nothing is published when it
    /// returns an error.
    fn publish<F>(&self, key_id: &str, update: F) -> Result<()>
    where
        F: FnOnce(Option<&Entry>) -> Result<Entry>,
    {
        let _writer = self.write_lock.lock();

        let current = self.snapshot.load_full();
        let entry = update(current.get(key_id).map(Arc::as_ref))?;
        let next = current.with_entry(key_id, entry);
        self.snapshot.store(Arc::new(next));

        Ok(())
    }
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore for MemoryKeyStore {
    fn get_private_key(&self, _ctx: &Context, id: &str) -> Result<Option<Arc<PrivateKey>>> {
        let key = self
            .lookup(id)?
            .and_then(|entry| entry.private_key().cloned());
        trace!("Private key lookup: {} (found: {})", id, key.is_some());
        Ok(key)
    }

    fn get_public_key(&self, _ctx: &Context, id: &str) -> Result<Option<Arc<PublicKey>>> {
        let key = self
            .lookup(id)?
            .and_then(|entry| entry.public_key().cloned());
        trace!("Public key lookup: {} (found: {})", id, key.is_some());
        Ok(key)
    }

    fn set_private_key(&self, _ctx: &Context, id: &str, key: PrivateKey) -> Result<()> {
        self.validate_id(id)?;
        let algorithm = key.algorithm();
        self.validate_algorithm(algorithm)?;

        let derived = key.public_key();
        let private_key = Arc::new(key);

        self.publish(id, |existing| {
            let public_key = match existing.and_then(Entry::public_key) {
                Some(current) if **current == derived => Arc::clone(current),
                Some(_) => {
                    warn!(
                        "Replacing public key for {} with the one derived from the new private key",
                        id
                    );
                    Arc::new(derived)
                }
                None => Arc::new(derived),
            };
            Ok(Entry::new(Some(private_key), Some(public_key)))
        })?;

        debug!("Stored private key: {} ({})", id, algorithm);
        Ok(())
    }

    fn set_public_key(&self, _ctx: &Context, id: &str, key: PublicKey) -> Result<()> {
        self.validate_id(id)?;
        let algorithm = key.algorithm();
        self.validate_algorithm(algorithm)?;

        let public_key = Arc::new(key);

        self.publish(id, |existing| {
            let private_key = existing.and_then(Entry::private_key).cloned();
            if let Some(private_key) = &private_key {
                if private_key.public_key() != *public_key {
                    return Err(KeyCacheError::KeyPairMismatch(format!(
                        "public key does not match the private key stored under {}",
                        id
                    )));
                }
            }
            Ok(Entry::new(private_key, Some(public_key)))
        })?;

        debug!("Stored public key: {} ({})", id, algorithm);
        Ok(())
    }
}

fn describe(key_id: &str, entry: &Entry) -> Result<KeyInfo> {
    let algorithm = entry.algorithm().ok_or_else(|| {
        KeyCacheError::InternalError(format!("entry {} holds no key material", key_id))
    })?;

    let fingerprint = entry
        .public_key()
        .map(|public_key| public_key.fingerprint())
        .transpose()?;

    Ok(KeyInfo {
        key_id: key_id.to_string(),
        algorithm,
        has_private_key: entry.private_key().is_some(),
        has_public_key: entry.public_key().is_some(),
        fingerprint,
        updated_at: entry.updated_at(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{codec, generate_key_pair, Curve, KeySide};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Barrier;
    use std::thread;

    fn p256_pair(seed: u64) -> (PrivateKey, PublicKey) {
        let mut rng = StdRng::seed_from_u64(seed);
        generate_key_pair(KeyAlgorithm::Ecdsa { curve: Curve::P256 }, &mut rng).unwrap()
    }

    fn rsa_pair(seed: u64) -> (PrivateKey, PublicKey) {
        let mut rng = StdRng::seed_from_u64(seed);
        generate_key_pair(KeyAlgorithm::Rsa { bits: 1024 }, &mut rng).unwrap()
    }

    fn relaxed_store() -> MemoryKeyStore {
        MemoryKeyStore::with_config(StoreConfig {
            min_rsa_bits: 1024,
            ..StoreConfig::default()
        })
    }

    fn ctx() -> Context {
        Context::background()
    }

    #[test]
    fn test_store_and_retrieve_private_key() {
        let store = MemoryKeyStore::new();
        let (private_key, _) = p256_pair(1);

        store.set_private_key(&ctx(), "foo", private_key.clone()).unwrap();

        let found = store.get_private_key(&ctx(), "foo").unwrap();
        assert_eq!(found.as_deref(), Some(&private_key));
    }

    #[test]
    fn test_private_key_populates_public_side() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(2);

        store.set_private_key(&ctx(), "k1", private_key).unwrap();

        let found = store.get_public_key(&ctx(), "k1").unwrap();
        assert_eq!(found.as_deref(), Some(&public_key));
    }

    #[test]
    fn test_sides_are_independent() {
        let store = MemoryKeyStore::new();
        let (_, public_key) = p256_pair(3);

        store.set_public_key(&ctx(), "k2", public_key.clone()).unwrap();

        assert!(store.get_private_key(&ctx(), "k2").unwrap().is_none());
        assert_eq!(
            store.get_public_key(&ctx(), "k2").unwrap().as_deref(),
            Some(&public_key)
        );
    }

    #[test]
    fn test_unknown_id() {
        let store = MemoryKeyStore::new();
        assert!(store.get_private_key(&ctx(), "unknown").unwrap().is_none());
        assert!(store.get_public_key(&ctx(), "unknown").unwrap().is_none());
        assert!(store.get_der(&ctx(), "unknown", KeySide::Public).unwrap().is_none());
        assert!(store.key_info("unknown").unwrap().is_none());
    }

    #[test]
    fn test_empty_id_rejected() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(4);

        let result = store.set_private_key(&ctx(), "", private_key);
        assert!(matches!(result, Err(KeyCacheError::InvalidInput(_))));

        let result = store.set_public_key(&ctx(), "", public_key);
        assert!(matches!(result, Err(KeyCacheError::InvalidInput(_))));

        assert!(store.is_empty());
    }

    #[test]
    fn test_long_id_rejected() {
        let store = MemoryKeyStore::with_config(StoreConfig {
            max_id_len: 8,
            ..StoreConfig::default()
        });
        let (private_key, _) = p256_pair(5);

        let result = store.set_private_key(&ctx(), "much-too-long", private_key);
        assert!(matches!(result, Err(KeyCacheError::InvalidInput(_))));
    }

    #[test]
    fn test_weak_rsa_rejected() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = rsa_pair(6);

        assert!(matches!(
            store.set_private_key(&ctx(), "rsa", private_key),
            Err(KeyCacheError::InvalidInput(_))
        ));
        assert!(matches!(
            store.set_public_key(&ctx(), "rsa", public_key),
            Err(KeyCacheError::InvalidInput(_))
        ));
        assert!(!store.contains("rsa"));
    }

    #[test]
    fn test_rsa_keys_with_relaxed_floor() {
        let store = relaxed_store();
        let (private_key, public_key) = rsa_pair(7);

        store.set_private_key(&ctx(), "rsa", private_key.clone()).unwrap();

        assert_eq!(
            store.get_private_key(&ctx(), "rsa").unwrap().as_deref(),
            Some(&private_key)
        );
        assert_eq!(
            store.get_public_key(&ctx(), "rsa").unwrap().as_deref(),
            Some(&public_key)
        );
    }

    #[test]
    fn test_mismatched_public_key_rejected() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(8);
        let (_, other_public) = p256_pair(9);

        store.set_private_key(&ctx(), "k", private_key).unwrap();

        let result = store.set_public_key(&ctx(), "k", other_public);
        assert!(matches!(result, Err(KeyCacheError::KeyPairMismatch(_))));

        // Failed write leaves the previous state published
        assert_eq!(
            store.get_public_key(&ctx(), "k").unwrap().as_deref(),
            Some(&public_key)
        );
    }

    #[test]
    fn test_private_key_replaces_stale_public_key() {
        let store = MemoryKeyStore::new();
        let (_, old_public) = p256_pair(10);
        let (private_key, public_key) = p256_pair(11);

        store.set_public_key(&ctx(), "k", old_public).unwrap();
        store.set_private_key(&ctx(), "k", private_key).unwrap();

        assert_eq!(
            store.get_public_key(&ctx(), "k").unwrap().as_deref(),
            Some(&public_key)
        );
    }

    #[test]
    fn test_rotation_order() {
        let (old_private, _) = p256_pair(15);
        let (new_private, new_public) = p256_pair(16);

        // Public first is rejected while the old private key is stored
        let store = MemoryKeyStore::new();
        store.set_private_key(&ctx(), "k", old_private.clone()).unwrap();
        assert!(matches!(
            store.set_public_key(&ctx(), "k", new_public.clone()),
            Err(KeyCacheError::KeyPairMismatch(_))
        ));
        store.set_private_key(&ctx(), "k", new_private.clone()).unwrap();
        assert_eq!(
            store.get_public_key(&ctx(), "k").unwrap().as_deref(),
            Some(&new_public)
        );

        // Private first, then the matching public key
        let store = MemoryKeyStore::new();
        store.set_private_key(&ctx(), "k", old_private).unwrap();
        store.set_private_key(&ctx(), "k", new_private.clone()).unwrap();
        store.set_public_key(&ctx(), "k", new_public.clone()).unwrap();
        assert_eq!(
            store.get_private_key(&ctx(), "k").unwrap().as_deref(),
            Some(&new_private)
        );
        assert_eq!(
            store.get_public_key(&ctx(), "k").unwrap().as_deref(),
            Some(&new_public)
        );
    }

    #[test]
    fn test_matching_public_key_is_kept() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(12);

        store.set_public_key(&ctx(), "k", public_key).unwrap();
        let before = store.get_public_key(&ctx(), "k").unwrap().unwrap();

        store.set_private_key(&ctx(), "k", private_key).unwrap();
        let after = store.get_public_key(&ctx(), "k").unwrap().unwrap();

        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_write_shares_untouched_entries() {
        let store = MemoryKeyStore::new();
        let (first, _) = p256_pair(13);
        let (second, _) = p256_pair(14);

        store.set_private_key(&ctx(), "a", first).unwrap();
        let before = store.snapshot();

        store.set_private_key(&ctx(), "b", second).unwrap();
        let after = store.snapshot();

        assert!(Arc::ptr_eq(before.get("a").unwrap(), after.get("a").unwrap()));
        // The earlier snapshot is unchanged
        assert!(before.get("b").is_none());
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_der_and_pem_export() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(15);

        store.set_private_key(&ctx(), "k", private_key.clone()).unwrap();

        let der = store.get_der(&ctx(), "k", KeySide::Private).unwrap().unwrap();
        assert_eq!(
            codec::private_key_from_der(der.expose()).unwrap(),
            private_key
        );

        let der = store.get_der(&ctx(), "k", KeySide::Public).unwrap().unwrap();
        assert_eq!(codec::public_key_from_der(der.expose()).unwrap(), public_key);

        let pem = store.get_pem(&ctx(), "k", KeySide::Public).unwrap().unwrap();
        assert_eq!(codec::decode_public_key(pem.expose()).unwrap(), public_key);
    }

    #[test]
    fn test_set_pem_through_trait_object() {
        let store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
        let (private_key, public_key) = p256_pair(16);
        let (private_pem, public_pem) = codec::encode_key_pair(&private_key, &public_key).unwrap();

        let side = store.set_pem(&ctx(), "pub", &public_pem).unwrap();
        assert_eq!(side, KeySide::Public);
        assert!(store.get_private_key(&ctx(), "pub").unwrap().is_none());

        let side = store.set_pem(&ctx(), "priv", private_pem.expose()).unwrap();
        assert_eq!(side, KeySide::Private);
        assert_eq!(
            store.get_public_key(&ctx(), "priv").unwrap().as_deref(),
            Some(&public_key)
        );

        assert!(matches!(
            store.set_pem(&ctx(), "bad", b"no armor here"),
            Err(KeyCacheError::NoArmorFound)
        ));
    }

    #[test]
    fn test_key_info() {
        let store = MemoryKeyStore::new();
        let (private_key, public_key) = p256_pair(17);
        let (_, other_public) = p256_pair(18);

        store.set_private_key(&ctx(), "b", private_key).unwrap();
        store.set_public_key(&ctx(), "a", other_public).unwrap();

        let info = store.key_info("b").unwrap().unwrap();
        assert_eq!(info.algorithm, KeyAlgorithm::Ecdsa { curve: Curve::P256 });
        assert!(info.has_private_key);
        assert!(info.has_public_key);
        assert_eq!(info.fingerprint, Some(public_key.fingerprint().unwrap()));

        let listed = store.list_keys().unwrap();
        let ids: Vec<_> = listed.iter().map(|info| info.key_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(!listed[0].has_private_key);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["algorithm"]["curve"], "P-256");
        assert_eq!(json["key_id"], "b");
    }

    #[test]
    fn test_independent_instances() {
        let first = MemoryKeyStore::new();
        let second = MemoryKeyStore::new();
        let (private_key, _) = p256_pair(19);

        first.set_private_key(&ctx(), "k", private_key).unwrap();

        assert!(first.contains("k"));
        assert!(!second.contains("k"));
        assert!(second.get_private_key(&ctx(), "k").unwrap().is_none());
    }

    #[test]
    fn test_concurrent_writers_then_readers() {
        const WRITERS: usize = 16;
        const READERS: usize = 8;

        let store = MemoryKeyStore::new();
        let keys: Vec<_> = (0..WRITERS).map(|i| p256_pair(100 + i as u64)).collect();

        let barrier = Barrier::new(WRITERS);
        thread::scope(|s| {
            for (i, (private_key, _)) in keys.iter().enumerate() {
                let store = &store;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    store
                        .set_private_key(&ctx(), &format!("key-{}", i), private_key.clone())
                        .unwrap();
                });
            }
        });

        assert_eq!(store.len(), WRITERS);

        let barrier = Barrier::new(READERS);
        thread::scope(|s| {
            for _ in 0..READERS {
                let store = &store;
                let keys = &keys;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for (i, (private_key, public_key)) in keys.iter().enumerate() {
                        let id = format!("key-{}", i);
                        let found = store.get_private_key(&ctx(), &id).unwrap();
                        assert_eq!(found.as_deref(), Some(private_key));
                        let found = store.get_public_key(&ctx(), &id).unwrap();
                        assert_eq!(found.as_deref(), Some(public_key));
                    }
                });
            }
        });
    }

    #[test]
    fn test_concurrent_mixed_sides_keep_both() {
        let (private_key, public_key) = p256_pair(200);

        for _ in 0..50 {
            let store = MemoryKeyStore::new();
            let barrier = Barrier::new(2);

            thread::scope(|s| {
                s.spawn(|| {
                    barrier.wait();
                    store
                        .set_private_key(&ctx(), "k3", private_key.clone())
                        .unwrap();
                });
                s.spawn(|| {
                    barrier.wait();
                    store
                        .set_public_key(&ctx(), "k3", public_key.clone())
                        .unwrap();
                });
            });

            assert_eq!(
                store.get_private_key(&ctx(), "k3").unwrap().as_deref(),
                Some(&private_key)
            );
            assert_eq!(
                store.get_public_key(&ctx(), "k3").unwrap().as_deref(),
                Some(&public_key)
            );
        }
    }

    #[test]
    fn test_readers_never_see_partial_entries() {
        const ROUNDS: usize = 64;

        let store = MemoryKeyStore::new();
        let pairs: Vec<_> = (0..4).map(|i| p256_pair(300 + i)).collect();

        thread::scope(|s| {
            s.spawn(|| {
                for round in 0..ROUNDS {
                    let (private_key, _) = &pairs[round % pairs.len()];
                    store
                        .set_private_key(&ctx(), "rotating", private_key.clone())
                        .unwrap();
                    store
                        .set_private_key(&ctx(), &format!("fill-{}", round), private_key.clone())
                        .unwrap();
                }
            });

            for _ in 0..4 {
                s.spawn(|| {
                    let mut last_len = 0;
                    while last_len < ROUNDS + 1 {
                        let snapshot = store.snapshot();
                        assert!(snapshot.len() >= last_len);
                        last_len = snapshot.len();

                        for (_, entry) in snapshot.iter() {
                            let private_key = entry.private_key().unwrap();
                            let public_key = entry.public_key().unwrap();
                            assert_eq!(private_key.public_key(), **public_key);
                        }
                    }
                });
            }
        });

        assert_eq!(store.len(), ROUNDS + 1);
    }
}
