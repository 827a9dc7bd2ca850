//! Key types and the PEM/PKCS#8 codec

pub mod armor;
pub mod codec;
pub mod keys;

pub use codec::{
    decode_ecdsa_key_pair, decode_ecdsa_private_key, decode_ecdsa_public_key, decode_key_pair,
    decode_private_key, decode_public_key, decode_rsa_private_key, decode_rsa_public_key,
    decode_verified_key_pair,
    encode_key_pair, encode_private_key, encode_public_key, generate_key_pem,
};
pub use keys::{
    generate_key_pair, Curve, EcdsaPrivateKey, EcdsaPublicKey, KeyAlgorithm, KeySide,
    PrivateKey, PublicKey, MIN_RSA_BITS,
};
