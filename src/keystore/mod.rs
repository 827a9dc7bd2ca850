//! Key storage
//!
//! This module provides:
//! - The `KeyStore` contract every backend implements
//! - A copy-on-write in-memory backend for concurrent lookups

pub mod context;
pub mod memory;
pub mod snapshot;

pub use crate::crypto::KeySide;
pub use context::Context;
pub use memory::{KeyInfo, MemoryKeyStore};
pub use snapshot::Entry;

use crate::crypto::armor;
use crate::crypto::codec;
use crate::crypto::{PrivateKey, PublicKey};
use crate::errors::Result;
use crate::security::SecureBytes;
use std::sync::Arc;

/// Storage for asymmetric keys addressed by an opaque identifier
///
/// Both halves of a pair are queried independently. `Ok(None)` means nothing
/// is stored for that id and side; it is not an error.
///
/// # Pair consistency
///
/// The private key is authoritative, so the two setters are not symmetric:
/// - `set_private_key` always succeeds for valid input and overwrites a
///   public key that no longer matches with the one derived from it.
/// - `set_public_key` fails with `KeyPairMismatch` when a private key is
///   stored under the id and the new public key does not belong to it.
///
/// To rotate a pair, set the private key first. Setting the new public key
/// first is rejected while the old private key is still stored.
pub trait KeyStore: Send + Sync {
    fn get_private_key(&self, ctx: &Context, id: &str) -> Result<Option<Arc<PrivateKey>>>;

    fn get_public_key(&self, ctx: &Context, id: &str) -> Result<Option<Arc<PublicKey>>>;

    /// Store a private key and the public key derived from it
    fn set_private_key(&self, ctx: &Context, id: &str, key: PrivateKey) -> Result<()>;

    /// Store a public key; it must match any private key already stored
    fn set_public_key(&self, ctx: &Context, id: &str, key: PublicKey) -> Result<()>;

    /// DER of the stored key: PKCS#8 for the private side, SPKI for the public side
    fn get_der(&self, ctx: &Context, id: &str, side: KeySide) -> Result<Option<SecureBytes>> {
        match side {
            KeySide::Private => self
                .get_private_key(ctx, id)?
                .map(|key| codec::private_key_to_der(&key))
                .transpose(),
            KeySide::Public => self
                .get_public_key(ctx, id)?
                .map(|key| codec::public_key_to_der(&key).map(SecureBytes::from))
                .transpose(),
        }
    }

    /// PEM document of the stored key
    fn get_pem(&self, ctx: &Context, id: &str, side: KeySide) -> Result<Option<SecureBytes>> {
        match side {
            KeySide::Private => self
                .get_private_key(ctx, id)?
                .map(|key| codec::encode_private_key(&key))
                .transpose(),
            KeySide::Public => self
                .get_public_key(ctx, id)?
                .map(|key| codec::encode_public_key(&key).map(SecureBytes::from))
                .transpose(),
        }
    }

    /// Store a PEM-encoded key, choosing the side from the block label
    ///
    /// Labels containing `PUBLIC KEY` are stored as public keys; anything else
    /// is parsed as PKCS#8.
    fn set_pem(&self, ctx: &Context, id: &str, input: &[u8]) -> Result<KeySide> {
        let armored = armor::decode(input)?;

        if armored.label.contains(armor::PUBLIC_KEY_LABEL) {
            let key = codec::public_key_from_der(&armored.der)?;
            self.set_public_key(ctx, id, key)?;
            Ok(KeySide::Public)
        } else {
            let key = codec::private_key_from_der(&armored.der)?;
            self.set_private_key(ctx, id, key)?;
            Ok(KeySide::Private)
        }
    }
}
