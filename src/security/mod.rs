//! Secure handling of private key bytes

pub mod zeroize;

pub use zeroize::SecureBytes;
