//! Key codec
//!
//! Converts keys to and from PEM-armored PKCS#8 (private) and
//! SubjectPublicKeyInfo (public) documents. All functions are pure.
//!
//! Two decode paths exist:
//! - `decode_private_key` / `decode_public_key` accept any supported
//!   algorithm.
//! - `decode_ecdsa_*` / `decode_rsa_*` require one algorithm family.
//!
//! Either way a well-formed payload of another family is a type mismatch.
//! `UnsupportedAlgorithm` is kept for EC keys on a curve outside the set.

use crate::crypto::armor::{self, PRIVATE_KEY_LABEL, PUBLIC_KEY_LABEL};
use crate::crypto::keys::{
    Curve, EcdsaPrivateKey, EcdsaPublicKey, KeyAlgorithm, KeySide, PrivateKey, PublicKey,
    ID_EC_PUBLIC_KEY, RSA_ENCRYPTION,
};
use crate::errors::{KeyCacheError, Result};
use crate::security::SecureBytes;
use pkcs8::der::Decode;
use pkcs8::{
    AlgorithmIdentifierRef, DecodePrivateKey, DecodePublicKey, EncodePrivateKey,
    EncodePublicKey, ObjectIdentifier, PrivateKeyInfo, SubjectPublicKeyInfoRef,
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
const X25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
const ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");

/// Expected family reported by the generic decode path
const ANY_SUPPORTED: &str = "ECDSA or RSA";

/// Algorithm family read from a DER algorithm identifier
enum Family {
    Ecdsa(Curve),
    Rsa,
    UnsupportedCurve(String),
    Other(String),
}

impl Family {
    fn identify(algorithm: &AlgorithmIdentifierRef<'_>) -> Self {
        if algorithm.oid == ID_EC_PUBLIC_KEY {
            match algorithm.parameters_oid() {
                Ok(curve_oid) => match Curve::from_oid(&curve_oid) {
                    Some(curve) => Family::Ecdsa(curve),
                    None => Family::UnsupportedCurve(curve_oid.to_string()),
                },
                Err(_) => Family::UnsupportedCurve("implicit or specified curve".to_string()),
            }
        } else if algorithm.oid == RSA_ENCRYPTION {
            Family::Rsa
        } else if algorithm.oid == ED25519 {
            Family::Other("Ed25519".to_string())
        } else if algorithm.oid == X25519 {
            Family::Other("X25519".to_string())
        } else if algorithm.oid == ED448 {
            Family::Other("Ed448".to_string())
        } else {
            Family::Other(algorithm.oid.to_string())
        }
    }

    fn name(&self) -> String {
        match self {
            Family::Ecdsa(curve) => KeyAlgorithm::Ecdsa { curve: *curve }.to_string(),
            Family::Rsa => "RSA".to_string(),
            Family::UnsupportedCurve(curve) => format!("ECDSA {}", curve),
            Family::Other(name) => name.clone(),
        }
    }

    fn unsupported(self) -> KeyCacheError {
        KeyCacheError::UnsupportedAlgorithm(self.name())
    }

    fn mismatch(self, expected: &str) -> KeyCacheError {
        if let Family::UnsupportedCurve(_) = self {
            if expected.contains("ECDSA") {
                return self.unsupported();
            }
        }
        KeyCacheError::KeyTypeMismatch {
            expected: expected.to_string(),
            found: self.name(),
        }
    }
}

// Encoding

/// Serialize a private key to PKCS#8 DER
pub fn private_key_to_der(key: &PrivateKey) -> Result<SecureBytes> {
    let document = match key {
        PrivateKey::Ecdsa(EcdsaPrivateKey::P256(k)) => k.to_pkcs8_der(),
        PrivateKey::Ecdsa(EcdsaPrivateKey::P384(k)) => k.to_pkcs8_der(),
        PrivateKey::Ecdsa(EcdsaPrivateKey::Secp256k1(k)) => k.to_pkcs8_der(),
        PrivateKey::Rsa(k) => k.to_pkcs8_der(),
    }
    .map_err(|e| KeyCacheError::encoding(KeySide::Private, e))?;

    Ok(SecureBytes::from(document.as_bytes()))
}

/// Serialize a public key to SubjectPublicKeyInfo DER
pub fn public_key_to_der(key: &PublicKey) -> Result<Vec<u8>> {
    let document = match key {
        PublicKey::Ecdsa(EcdsaPublicKey::P256(k)) => k.to_public_key_der(),
        PublicKey::Ecdsa(EcdsaPublicKey::P384(k)) => k.to_public_key_der(),
        PublicKey::Ecdsa(EcdsaPublicKey::Secp256k1(k)) => k.to_public_key_der(),
        PublicKey::Rsa(k) => k.to_public_key_der(),
    }
    .map_err(|e| KeyCacheError::encoding(KeySide::Public, e))?;

    Ok(document.as_bytes().to_vec())
}

/// Encode a private key as a `PRIVATE KEY` PEM document
pub fn encode_private_key(key: &PrivateKey) -> Result<SecureBytes> {
    let der = private_key_to_der(key)?;
    let pem = armor::encode(PRIVATE_KEY_LABEL, der.expose())
        .map(Zeroizing::new)
        .map_err(|e| KeyCacheError::encoding(KeySide::Private, e))?;

    Ok(SecureBytes::from(pem.as_bytes()))
}

/// Encode a public key as a `PUBLIC KEY` PEM document
pub fn encode_public_key(key: &PublicKey) -> Result<Vec<u8>> {
    let der = public_key_to_der(key)?;
    let pem = armor::encode(PUBLIC_KEY_LABEL, &der)
        .map_err(|e| KeyCacheError::encoding(KeySide::Public, e))?;

    Ok(pem.into_bytes())
}

/// Encode both halves of a key pair
pub fn encode_key_pair(
    private_key: &PrivateKey,
    public_key: &PublicKey,
) -> Result<(SecureBytes, Vec<u8>)> {
    let private_pem = encode_private_key(private_key)?;
    let public_pem = encode_public_key(public_key)?;
    Ok((private_pem, public_pem))
}

/// Generate a key pair and return it PEM encoded
pub fn generate_key_pem<R: RngCore + CryptoRng>(
    algorithm: KeyAlgorithm,
    rng: &mut R,
) -> Result<(SecureBytes, Vec<u8>)> {
    let (private_key, public_key) = crate::crypto::generate_key_pair(algorithm, rng)?;
    encode_key_pair(&private_key, &public_key)
}

// Decoding from DER

fn identify_private(der: &[u8]) -> Result<Family> {
    let info = PrivateKeyInfo::from_der(der)
        .map_err(|e| KeyCacheError::decoding(KeySide::Private, e))?;
    Ok(Family::identify(&info.algorithm))
}

fn identify_public(der: &[u8]) -> Result<Family> {
    let info = SubjectPublicKeyInfoRef::from_der(der)
        .map_err(|e| KeyCacheError::decoding(KeySide::Public, e))?;
    Ok(Family::identify(&info.algorithm))
}

fn ecdsa_private_from_der(curve: Curve, der: &[u8]) -> Result<EcdsaPrivateKey> {
    let key = match curve {
        Curve::P256 => p256::SecretKey::from_pkcs8_der(der).map(EcdsaPrivateKey::P256),
        Curve::P384 => p384::SecretKey::from_pkcs8_der(der).map(EcdsaPrivateKey::P384),
        Curve::Secp256k1 => k256::SecretKey::from_pkcs8_der(der).map(EcdsaPrivateKey::Secp256k1),
    };
    key.map_err(|e| KeyCacheError::decoding(KeySide::Private, e))
}

fn ecdsa_public_from_der(curve: Curve, der: &[u8]) -> Result<EcdsaPublicKey> {
    let key = match curve {
        Curve::P256 => p256::PublicKey::from_public_key_der(der).map(EcdsaPublicKey::P256),
        Curve::P384 => p384::PublicKey::from_public_key_der(der).map(EcdsaPublicKey::P384),
        Curve::Secp256k1 => {
            k256::PublicKey::from_public_key_der(der).map(EcdsaPublicKey::Secp256k1)
        }
    };
    key.map_err(|e| KeyCacheError::decoding(KeySide::Public, e))
}

fn rsa_private_from_der(der: &[u8]) -> Result<rsa::RsaPrivateKey> {
    rsa::RsaPrivateKey::from_pkcs8_der(der)
        .map_err(|e| KeyCacheError::decoding(KeySide::Private, e))
}

fn rsa_public_from_der(der: &[u8]) -> Result<rsa::RsaPublicKey> {
    rsa::RsaPublicKey::from_public_key_der(der)
        .map_err(|e| KeyCacheError::decoding(KeySide::Public, e))
}

/// Parse PKCS#8 DER as a private key of any supported algorithm
pub fn private_key_from_der(der: &[u8]) -> Result<PrivateKey> {
    match identify_private(der)? {
        Family::Ecdsa(curve) => ecdsa_private_from_der(curve, der).map(PrivateKey::Ecdsa),
        Family::Rsa => rsa_private_from_der(der).map(PrivateKey::Rsa),
        other => Err(other.mismatch(ANY_SUPPORTED)),
    }
}

/// Parse SubjectPublicKeyInfo DER as a public key of any supported algorithm
pub fn public_key_from_der(der: &[u8]) -> Result<PublicKey> {
    match identify_public(der)? {
        Family::Ecdsa(curve) => ecdsa_public_from_der(curve, der).map(PublicKey::Ecdsa),
        Family::Rsa => rsa_public_from_der(der).map(PublicKey::Rsa),
        other => Err(other.mismatch(ANY_SUPPORTED)),
    }
}

// Decoding from PEM

fn unarmor(input: &[u8], label: &str, side: KeySide) -> Result<Zeroizing<Vec<u8>>> {
    let armored = armor::decode(input)?;
    if armored.label != label {
        return Err(KeyCacheError::decoding(
            side,
            format!("expected {} block, found {}", label, armored.label),
        ));
    }
    Ok(armored.der)
}

/// Decode a `PRIVATE KEY` PEM document of any supported algorithm
pub fn decode_private_key(input: &[u8]) -> Result<PrivateKey> {
    let der = unarmor(input, PRIVATE_KEY_LABEL, KeySide::Private)?;
    private_key_from_der(&der)
}

/// Decode a `PUBLIC KEY` PEM document of any supported algorithm
pub fn decode_public_key(input: &[u8]) -> Result<PublicKey> {
    let der = unarmor(input, PUBLIC_KEY_LABEL, KeySide::Public)?;
    public_key_from_der(&der)
}

/// Decode a `PRIVATE KEY` PEM document that must hold an ECDSA key
pub fn decode_ecdsa_private_key(input: &[u8]) -> Result<EcdsaPrivateKey> {
    let der = unarmor(input, PRIVATE_KEY_LABEL, KeySide::Private)?;
    match identify_private(&der)? {
        Family::Ecdsa(curve) => ecdsa_private_from_der(curve, &der),
        other => Err(other.mismatch("ECDSA")),
    }
}

/// Decode a `PUBLIC KEY` PEM document that must hold an ECDSA key
pub fn decode_ecdsa_public_key(input: &[u8]) -> Result<EcdsaPublicKey> {
    let der = unarmor(input, PUBLIC_KEY_LABEL, KeySide::Public)?;
    match identify_public(&der)? {
        Family::Ecdsa(curve) => ecdsa_public_from_der(curve, &der),
        other => Err(other.mismatch("ECDSA")),
    }
}

/// Decode a `PRIVATE KEY` PEM document that must hold an RSA key
pub fn decode_rsa_private_key(input: &[u8]) -> Result<rsa::RsaPrivateKey> {
    let der = unarmor(input, PRIVATE_KEY_LABEL, KeySide::Private)?;
    match identify_private(&der)? {
        Family::Rsa => rsa_private_from_der(&der),
        other => Err(other.mismatch("RSA")),
    }
}

/// Decode a `PUBLIC KEY` PEM document that must hold an RSA key
pub fn decode_rsa_public_key(input: &[u8]) -> Result<rsa::RsaPublicKey> {
    let der = unarmor(input, PUBLIC_KEY_LABEL, KeySide::Public)?;
    match identify_public(&der)? {
        Family::Rsa => rsa_public_from_der(&der),
        other => Err(other.mismatch("RSA")),
    }
}

/// Decode both halves of a key pair, stopping at the first failure
///
/// The halves are not checked against each other; see
/// [`decode_verified_key_pair`].
pub fn decode_key_pair(private_pem: &[u8], public_pem: &[u8]) -> Result<(PrivateKey, PublicKey)> {
    let private_key = decode_private_key(private_pem)?;
    let public_key = decode_public_key(public_pem)?;
    Ok((private_key, public_key))
}

/// Decode both halves of a key pair and require that they belong together
pub fn decode_verified_key_pair(
    private_pem: &[u8],
    public_pem: &[u8],
) -> Result<(PrivateKey, PublicKey)> {
    let (private_key, public_key) = decode_key_pair(private_pem, public_pem)?;
    if private_key.public_key() != public_key {
        return Err(KeyCacheError::KeyPairMismatch(
            "public key does not belong to the private key".to_string(),
        ));
    }
    Ok((private_key, public_key))
}

/// Decode both halves of an ECDSA key pair, stopping at the first failure
pub fn decode_ecdsa_key_pair(
    private_pem: &[u8],
    public_pem: &[u8],
) -> Result<(EcdsaPrivateKey, EcdsaPublicKey)> {
    let private_key = decode_ecdsa_private_key(private_pem)?;
    let public_key = decode_ecdsa_public_key(public_pem)?;
    Ok((private_key, public_key))
}
