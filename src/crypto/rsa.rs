//! RSA kernels
//!
//! Raw RSA private-key transformation over a CRT key (p, q, dP, dQ, qInv)
//! and CRT key generation with the fixed public exponent 65537. All inputs
//! and outputs are big-endian byte strings; padding and DigestInfo
//! formatting happen in the applet, not here.

use log::debug;
use rand::rngs::OsRng;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};

use super::CryptoError;

/// A freshly generated CRT key, all parts big-endian
///
/// `p`, `q`, `dp`, `dq`, `qinv` are padded to half the modulus size,
/// `modulus` to the full size.
#[derive(Debug)]
pub struct RsaCrtKey {
    pub p: Vec<u8>,
    pub q: Vec<u8>,
    pub dp: Vec<u8>,
    pub dq: Vec<u8>,
    pub qinv: Vec<u8>,
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
}

/// Borrowed CRT key parts for the private-key transformation
#[derive(Debug, Clone, Copy)]
pub struct CrtParts<'a> {
    pub p: &'a [u8],
    pub q: &'a [u8],
    pub dp: &'a [u8],
    pub dq: &'a [u8],
    pub qinv: &'a [u8],
}

/// Encode a big integer as exactly `len` big-endian bytes
pub fn to_be_padded(n: &BigUint, len: usize) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    if bytes.len() >= len {
        bytes[bytes.len() - len..].to_vec()
    } else {
        let mut out = vec![0u8; len - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }
}

/// Generate an RSA CRT key with public exponent 65537
pub fn generate(bits: usize) -> Result<RsaCrtKey, CryptoError> {
    debug!("generating RSA-{} CRT key", bits);

    let key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;

    let primes = key.primes();
    if primes.len() < 2 {
        return Err(CryptoError::InvalidKey("missing prime factors".to_string()));
    }
    let p = &primes[0];
    let q = &primes[1];

    let one = BigUint::from(1u8);
    let dp = key.d() % (p - &one);
    let dq = key.d() % (q - &one);
    let qinv = mod_inverse(q, p)
        .ok_or_else(|| CryptoError::InvalidKey("q has no inverse mod p".to_string()))?;

    let half = bits / 16;
    Ok(RsaCrtKey {
        p: to_be_padded(p, half),
        q: to_be_padded(q, half),
        dp: to_be_padded(&dp, half),
        dq: to_be_padded(&dq, half),
        qinv: to_be_padded(&qinv, half),
        modulus: to_be_padded(key.n(), bits / 8),
        public_exponent: key.e().to_bytes_be(),
    })
}

/// Raw private-key transformation `input^d mod n` via CRT recombination
///
/// The input must be a big-endian number below the modulus; anything
/// larger is rejected so the caller can wipe its buffers. The result is
/// padded to the modulus size (|p| + |q| bytes).
pub fn raw_private(parts: &CrtParts<'_>, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let p = BigUint::from_bytes_be(parts.p);
    let q = BigUint::from_bytes_be(parts.q);
    let dp = BigUint::from_bytes_be(parts.dp);
    let dq = BigUint::from_bytes_be(parts.dq);
    let qinv = BigUint::from_bytes_be(parts.qinv);

    let zero = BigUint::from(0u8);
    if p == zero || q == zero {
        return Err(CryptoError::InvalidKey("empty prime".to_string()));
    }

    let n = &p * &q;
    let c = BigUint::from_bytes_be(input);
    if c >= n {
        return Err(CryptoError::MessageOutOfRange);
    }

    // m1 = c^dP mod p, m2 = c^dQ mod q, h = qInv (m1 - m2) mod p
    let m1 = c.modpow(&dp, &p);
    let m2 = c.modpow(&dq, &q);
    let diff = if m1 >= m2 {
        &m1 - &m2
    } else {
        &p - ((&m2 - &m1) % &p)
    };
    let h = (&diff * &qinv) % &p;
    let m = &m2 + &h * &q;

    Ok(to_be_padded(&m, parts.p.len() + parts.q.len()))
}

/// Public-key transformation `input^e mod n`
pub fn raw_public(modulus: &[u8], exponent: &[u8], input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let n = BigUint::from_bytes_be(modulus);
    let e = BigUint::from_bytes_be(exponent);
    let c = BigUint::from_bytes_be(input);
    if c >= n {
        return Err(CryptoError::MessageOutOfRange);
    }
    Ok(to_be_padded(&c.modpow(&e, &n), modulus.len()))
}

/// Compute a^(-1) mod m via the extended Euclidean algorithm
///
/// Signs are tracked separately since `BigUint` is unsigned. Returns None
/// if the inverse does not exist.
fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    let one = BigUint::from(1u8);
    let zero = BigUint::from(0u8);

    let mut old_r = m.clone();
    let mut r = a % m;
    let mut old_s = zero.clone();
    let mut s = one.clone();
    let mut old_s_neg = false;
    let mut s_neg = false;

    while r != zero {
        let quotient = &old_r / &r;

        let temp_r = old_r;
        old_r = r.clone();
        r = temp_r - &quotient * &r;

        // new_s = old_s - quotient * s, with sign tracking
        let (new_s, new_s_neg) = {
            let qs = &quotient * &s;
            if old_s_neg == s_neg {
                if old_s >= qs {
                    (old_s.clone() - &qs, old_s_neg)
                } else {
                    (qs - &old_s, !old_s_neg)
                }
            } else {
                (old_s.clone() + &qs, old_s_neg)
            }
        };
        old_s = s;
        old_s_neg = s_neg;
        s = new_s;
        s_neg = new_s_neg;
    }

    if old_r != one {
        return None;
    }

    Some(if old_s_neg { m - (&old_s % m) } else { old_s % m })
}
