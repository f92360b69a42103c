//! Cryptographic kernels
//!
//! The arithmetic backing the applet: raw CRT RSA, ECDSA/ECDH over the
//! supported curves, and single-block DES/AES. The kernels work on
//! big-endian byte strings at their boundaries; whatever internal
//! representation the underlying crates use never leaks out.

pub mod curves;
pub mod ec;
pub mod rsa;
pub mod symmetric;

use thiserror::Error;

/// Errors reported by the kernels
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGenerationFailed(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid input data: {0}")]
    InvalidData(String),

    #[error("message out of range for the key modulus")]
    MessageOutOfRange,
}
