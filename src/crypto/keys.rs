//! Supported key material
//!
//! The set of algorithms is closed: ECDSA over P-256, P-384 and secp256k1,
//! plus RSA. Keys of any other algorithm cannot be represented here and are
//! rejected by the codec.

use crate::crypto::codec;
use crate::errors::{KeyCacheError, Result};
use pkcs8::ObjectIdentifier;
use rand::{CryptoRng, RngCore};
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Smallest RSA modulus that can be generated
pub const MIN_RSA_BITS: usize = 1024;

/// id-ecPublicKey (RFC 5480)
pub(crate) const ID_EC_PUBLIC_KEY: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");

/// rsaEncryption (RFC 8017)
pub(crate) const RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");

/// Which half of a key pair an operation refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySide {
    Private,
    Public,
}

impl KeySide {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySide::Private => "private",
            KeySide::Public => "public",
        }
    }
}

impl fmt::Display for KeySide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named elliptic curve for ECDSA keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    #[serde(rename = "P-256")]
    P256,
    #[serde(rename = "P-384")]
    P384,
    #[serde(rename = "secp256k1")]
    Secp256k1,
}

impl Curve {
    pub fn as_str(&self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::Secp256k1 => "secp256k1",
        }
    }

    /// Named curve OID carried in the algorithm parameters
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Curve::P256 => SECP256R1,
            Curve::P384 => SECP384R1,
            Curve::Secp256k1 => SECP256K1,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Curve::P256, Curve::P384, Curve::Secp256k1]
            .into_iter()
            .find(|curve| curve.oid() == *oid)
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Algorithm and parameters of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum KeyAlgorithm {
    Ecdsa { curve: Curve },
    Rsa { bits: usize },
}

impl KeyAlgorithm {
    /// Algorithm family name, without parameters
    pub fn family(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ecdsa { .. } => "ECDSA",
            KeyAlgorithm::Rsa { .. } => "RSA",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAlgorithm::Ecdsa { curve } => write!(f, "ECDSA {}", curve),
            KeyAlgorithm::Rsa { bits } => write!(f, "RSA-{}", bits),
        }
    }
}

/// ECDSA private key on one of the supported curves
#[derive(Clone, PartialEq)]
pub enum EcdsaPrivateKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    Secp256k1(k256::SecretKey),
}

impl EcdsaPrivateKey {
    /// Generate a new random key on `curve`
    pub fn random<R: RngCore + CryptoRng>(curve: Curve, rng: &mut R) -> Self {
        match curve {
            Curve::P256 => EcdsaPrivateKey::P256(p256::SecretKey::random(rng)),
            Curve::P384 => EcdsaPrivateKey::P384(p384::SecretKey::random(rng)),
            Curve::Secp256k1 => EcdsaPrivateKey::Secp256k1(k256::SecretKey::random(rng)),
        }
    }

    pub fn curve(&self) -> Curve {
        match self {
            EcdsaPrivateKey::P256(_) => Curve::P256,
            EcdsaPrivateKey::P384(_) => Curve::P384,
            EcdsaPrivateKey::Secp256k1(_) => Curve::Secp256k1,
        }
    }

    pub fn public_key(&self) -> EcdsaPublicKey {
        match self {
            EcdsaPrivateKey::P256(k) => EcdsaPublicKey::P256(k.public_key()),
            EcdsaPrivateKey::P384(k) => EcdsaPublicKey::P384(k.public_key()),
            EcdsaPrivateKey::Secp256k1(k) => EcdsaPublicKey::Secp256k1(k.public_key()),
        }
    }
}

impl fmt::Debug for EcdsaPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EcdsaPrivateKey").field(&self.curve()).finish()
    }
}

/// ECDSA public key on one of the supported curves
#[derive(Debug, Clone, PartialEq)]
pub enum EcdsaPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
    Secp256k1(k256::PublicKey),
}

impl EcdsaPublicKey {
    pub fn curve(&self) -> Curve {
        match self {
            EcdsaPublicKey::P256(_) => Curve::P256,
            EcdsaPublicKey::P384(_) => Curve::P384,
            EcdsaPublicKey::Secp256k1(_) => Curve::Secp256k1,
        }
    }
}

/// Private key of any supported algorithm
#[derive(Clone, PartialEq)]
pub enum PrivateKey {
    Ecdsa(EcdsaPrivateKey),
    Rsa(rsa::RsaPrivateKey),
}

impl PrivateKey {
    /// Generate a new random private key
    pub fn generate<R: RngCore + CryptoRng>(algorithm: KeyAlgorithm, rng: &mut R) -> Result<Self> {
        match algorithm {
            KeyAlgorithm::Ecdsa { curve } => {
                Ok(PrivateKey::Ecdsa(EcdsaPrivateKey::random(curve, rng)))
            }
            KeyAlgorithm::Rsa { bits } => {
                if bits < MIN_RSA_BITS {
                    return Err(KeyCacheError::InvalidInput(format!(
                        "RSA keys must be at least {} bits, got {}",
                        MIN_RSA_BITS, bits
                    )));
                }
                let key = rsa::RsaPrivateKey::new(rng, bits)
                    .map_err(|e| KeyCacheError::InternalError(e.to_string()))?;
                Ok(PrivateKey::Rsa(key))
            }
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PrivateKey::Ecdsa(k) => KeyAlgorithm::Ecdsa { curve: k.curve() },
            PrivateKey::Rsa(k) => KeyAlgorithm::Rsa { bits: k.n().bits() },
        }
    }

    /// Derive the matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Ecdsa(k) => PublicKey::Ecdsa(k.public_key()),
            PrivateKey::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey")
            .field(&self.algorithm().to_string())
            .finish()
    }
}

impl From<EcdsaPrivateKey> for PrivateKey {
    fn from(key: EcdsaPrivateKey) -> Self {
        PrivateKey::Ecdsa(key)
    }
}

impl From<p256::SecretKey> for PrivateKey {
    fn from(key: p256::SecretKey) -> Self {
        PrivateKey::Ecdsa(EcdsaPrivateKey::P256(key))
    }
}

impl From<p384::SecretKey> for PrivateKey {
    fn from(key: p384::SecretKey) -> Self {
        PrivateKey::Ecdsa(EcdsaPrivateKey::P384(key))
    }
}

impl From<k256::SecretKey> for PrivateKey {
    fn from(key: k256::SecretKey) -> Self {
        PrivateKey::Ecdsa(EcdsaPrivateKey::Secp256k1(key))
    }
}

impl From<rsa::RsaPrivateKey> for PrivateKey {
    fn from(key: rsa::RsaPrivateKey) -> Self {
        PrivateKey::Rsa(key)
    }
}

/// Public key of any supported algorithm
#[derive(Debug, Clone, PartialEq)]
pub enum PublicKey {
    Ecdsa(EcdsaPublicKey),
    Rsa(rsa::RsaPublicKey),
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Ecdsa(k) => KeyAlgorithm::Ecdsa { curve: k.curve() },
            PublicKey::Rsa(k) => KeyAlgorithm::Rsa { bits: k.n().bits() },
        }
    }

    /// Lowercase hex SHA-256 of the SubjectPublicKeyInfo DER
    pub fn fingerprint(&self) -> Result<String> {
        let der = codec::public_key_to_der(self)?;
        Ok(hex::encode(Sha256::digest(&der)))
    }
}

impl From<EcdsaPublicKey> for PublicKey {
    fn from(key: EcdsaPublicKey) -> Self {
        PublicKey::Ecdsa(key)
    }
}

impl From<p256::PublicKey> for PublicKey {
    fn from(key: p256::PublicKey) -> Self {
        PublicKey::Ecdsa(EcdsaPublicKey::P256(key))
    }
}

impl From<p384::PublicKey> for PublicKey {
    fn from(key: p384::PublicKey) -> Self {
        PublicKey::Ecdsa(EcdsaPublicKey::P384(key))
    }
}

impl From<k256::PublicKey> for PublicKey {
    fn from(key: k256::PublicKey) -> Self {
        PublicKey::Ecdsa(EcdsaPublicKey::Secp256k1(key))
    }
}

impl From<rsa::RsaPublicKey> for PublicKey {
    fn from(key: rsa::RsaPublicKey) -> Self {
        PublicKey::Rsa(key)
    }
}

/// Generate a key pair from the injected random source
pub fn generate_key_pair<R: RngCore + CryptoRng>(
    algorithm: KeyAlgorithm,
    rng: &mut R,
) -> Result<(PrivateKey, PublicKey)> {
    let private_key = PrivateKey::generate(algorithm, rng)?;
    let public_key = private_key.public_key();
    Ok((private_key, public_key))
}
