//! keycache - armored key codec and concurrent in-memory key cache
//!
//! Two pieces:
//! - A codec that turns ECDSA (P-256, P-384, secp256k1) and RSA keys into
//!   PEM-armored PKCS#8 / SubjectPublicKeyInfo documents and back.
//! - A key store addressed by opaque ids whose reads are lock-free. Writers
//!   build a new copy of the map and swap it in atomically.
//!
//! # Usage
//!
//! ```
//! use keycache::crypto::{self, Curve, KeyAlgorithm};
//! use keycache::keystore::{Context, KeyStore, MemoryKeyStore};
//!
//! let mut rng = rand::rngs::OsRng;
//! let (private_key, public_key) =
//!     crypto::generate_key_pair(KeyAlgorithm::Ecdsa { curve: Curve::P256 }, &mut rng)?;
//!
//! let store = MemoryKeyStore::new();
//! let ctx = Context::background();
//! store.set_private_key(&ctx, "signer", private_key)?;
//!
//! // The public side is derived on write
//! let stored = store.get_public_key(&ctx, "signer")?.expect("public key");
//! assert_eq!(*stored, public_key);
//!
//! let pem = crypto::encode_public_key(&stored)?;
//! assert_eq!(crypto::decode_public_key(&pem)?, public_key);
//! # Ok::<(), keycache::errors::KeyCacheError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod errors;
pub mod keystore;
pub mod logging;
pub mod security;

pub use config::{Config, LoggingConfig, StoreConfig};
pub use errors::{KeyCacheError, Result};
pub use keystore::{Context, KeyStore, MemoryKeyStore};
