//! EC kernels
//!
//! ECDSA prehash signing, X-coordinate ECDH and key generation over the
//! supported curves, plus the DER encoding of an (r, s) signature pair.
//! Scalars, coordinates and shared secrets are big-endian byte strings
//! padded to the curve's scalar size.
//!
//! Key generation and ECDH run generically over any `CurveArithmetic`
//! curve. ECDSA signing uses each curve crate's `SigningKey`, except for
//! P-192: its crate ships verification only (signing below 112-bit
//! strength is disallowed by NIST SP 800-131A), so the signing equation is
//! evaluated here directly on the crate's scalar and point arithmetic.

use elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytes, FieldBytesSize};
use log::debug;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use rand::rngs::OsRng;

use super::curves::CurveId;
use super::CryptoError;

/// A generated EC key pair
///
/// `secret` is the big-endian scalar, `public_point` the uncompressed
/// `04 || X || Y` encoding.
#[derive(Debug)]
pub struct EcKeypair {
    pub secret: Vec<u8>,
    pub public_point: Vec<u8>,
}

/// Generate a key pair on the given curve
pub fn generate_keypair(curve: CurveId) -> EcKeypair {
    debug!("generating {:?} keypair", curve);
    match curve {
        CurveId::P192 => keypair_generic::<p192::NistP192>(),
        CurveId::P256 => keypair_generic::<p256::NistP256>(),
        CurveId::P384 => keypair_generic::<p384::NistP384>(),
        CurveId::P521 => keypair_generic::<p521::NistP521>(),
        CurveId::Secp256k1 => keypair_generic::<k256::Secp256k1>(),
    }
}

fn keypair_generic<C>() -> EcKeypair
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let secret = elliptic_curve::SecretKey::<C>::random(&mut OsRng);
    let public_point = secret
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec();
    EcKeypair {
        secret: secret.to_bytes().to_vec(),
        public_point,
    }
}

macro_rules! sign_arm {
    ($curve:ident, $secret:expr, $prehash:expr) => {{
        let key = $curve::ecdsa::SigningKey::from_slice($secret)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let signature: $curve::ecdsa::Signature = key
            .sign_prehash($prehash)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let (r, s) = signature.split_bytes();
        (r.to_vec(), s.to_vec())
    }};
}

/// ECDSA-sign a prehashed message, returning (r, s) as fixed-width
/// big-endian scalars
///
/// A prehash longer than the scalar field takes its leftmost bits, a
/// shorter one is zero-extended on the left, per the usual ECDSA rules.
pub fn sign_prehash(
    curve: CurveId,
    secret: &[u8],
    prehash: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    let (r, s) = match curve {
        CurveId::P192 => p192_sign_prehash(secret, prehash)?,
        CurveId::P256 => sign_arm!(p256, secret, prehash),
        CurveId::P384 => sign_arm!(p384, secret, prehash),
        CurveId::P521 => sign_arm!(p521, secret, prehash),
        CurveId::Secp256k1 => sign_arm!(k256, secret, prehash),
    };
    Ok((r, s))
}

/// ECDSA over P-192, written out against the curve crate's arithmetic
///
/// r = (k·G).x mod n, s = k⁻¹ (z + r·d) mod n, with a fresh random k per
/// attempt and the usual rejection of zero values.
fn p192_sign_prehash(secret: &[u8], prehash: &[u8]) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
    use elliptic_curve::bigint::U192;
    use elliptic_curve::group::Group;
    use elliptic_curve::ops::Reduce;
    use elliptic_curve::point::AffineCoordinates;
    use elliptic_curve::{Field, PrimeField, ScalarPrimitive};
    use p192::{NistP192, ProjectivePoint, Scalar};

    let d_primitive = ScalarPrimitive::<NistP192>::from_slice(secret)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let d = Scalar::from(d_primitive);
    if bool::from(d.is_zero()) {
        return Err(CryptoError::InvalidKey("zero private scalar".to_string()));
    }

    // hash to scalar: left-pad to the field size and reduce mod n
    let mut padded = p192::FieldBytes::default();
    let hash = &prehash[..prehash.len().min(padded.len())];
    padded[24 - hash.len()..].copy_from_slice(hash);
    let z = <Scalar as Reduce<U192>>::reduce_bytes(&padded);

    loop {
        let k = Scalar::random(&mut OsRng);
        if bool::from(k.is_zero()) {
            continue;
        }
        let point = (ProjectivePoint::generator() * k).to_affine();
        let r = <Scalar as Reduce<U192>>::reduce_bytes(&point.x());
        if bool::from(r.is_zero()) {
            continue;
        }
        let k_inv = Option::<Scalar>::from(k.invert())
            .ok_or_else(|| CryptoError::SigningFailed("uninvertible nonce".to_string()))?;
        let s = k_inv * (z + r * d);
        if bool::from(s.is_zero()) {
            continue;
        }
        return Ok((r.to_repr().to_vec(), s.to_repr().to_vec()));
    }
}

/// X-coordinate ECDH: derive `d · P` and return the X coordinate
///
/// `peer_x`/`peer_y` must each be exactly the curve's scalar size; the
/// peer point is validated to lie on the curve.
pub fn derive_shared_x(
    curve: CurveId,
    secret: &[u8],
    peer_x: &[u8],
    peer_y: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let scalar = curve.scalar_len();
    if peer_x.len() != scalar || peer_y.len() != scalar {
        return Err(CryptoError::InvalidData(
            "peer coordinate size mismatch".to_string(),
        ));
    }
    match curve {
        CurveId::P192 => ecdh_generic::<p192::NistP192>(secret, peer_x, peer_y),
        CurveId::P256 => ecdh_generic::<p256::NistP256>(secret, peer_x, peer_y),
        CurveId::P384 => ecdh_generic::<p384::NistP384>(secret, peer_x, peer_y),
        CurveId::P521 => ecdh_generic::<p521::NistP521>(secret, peer_x, peer_y),
        CurveId::Secp256k1 => ecdh_generic::<k256::Secp256k1>(secret, peer_x, peer_y),
    }
}

fn ecdh_generic<C>(secret: &[u8], peer_x: &[u8], peer_y: &[u8]) -> Result<Vec<u8>, CryptoError>
where
    C: CurveArithmetic,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let secret = elliptic_curve::SecretKey::<C>::from_slice(secret)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let point = elliptic_curve::sec1::EncodedPoint::<C>::from_affine_coordinates(
        FieldBytes::<C>::from_slice(peer_x),
        FieldBytes::<C>::from_slice(peer_y),
        false,
    );
    let peer = Option::<elliptic_curve::PublicKey<C>>::from(
        elliptic_curve::PublicKey::from_encoded_point(&point),
    )
    .ok_or_else(|| CryptoError::InvalidData("peer point not on curve".to_string()))?;

    let shared = elliptic_curve::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
    Ok(shared.raw_secret_bytes().to_vec())
}

/// Encode an (r, s) pair as a DER `SEQUENCE { INTEGER, INTEGER }`
///
/// Integers are minimal: leading zero bytes are trimmed and a single
/// `0x00` is inserted iff the high bit of the magnitude is set. The outer
/// length uses the `81 LL` long form when the content exceeds 127 bytes,
/// which among the supported curves only P-521 reaches.
pub fn encode_signature_der(r: &[u8], s: &[u8]) -> Vec<u8> {
    fn push_integer(out: &mut Vec<u8>, magnitude: &[u8]) {
        let mut m = magnitude;
        while m.len() > 1 && m[0] == 0 {
            m = &m[1..];
        }
        let pad = !m.is_empty() && m[0] & 0x80 != 0;
        out.push(0x02);
        out.push((m.len() + pad as usize) as u8);
        if pad {
            out.push(0x00);
        }
        out.extend_from_slice(m);
    }

    let mut content = Vec::with_capacity(2 * (r.len() + 3));
    push_integer(&mut content, r);
    push_integer(&mut content, s);

    let mut out = vec![0x30];
    out.extend(crate::tlv::encode_length(content.len()));
    out.extend(content);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::hazmat::PrehashVerifier;

    #[test]
    fn test_keypair_sizes() {
        for (curve, scalar, point) in [
            (CurveId::P192, 24, 49),
            (CurveId::P256, 32, 65),
            (CurveId::P384, 48, 97),
            (CurveId::P521, 66, 133),
            (CurveId::Secp256k1, 32, 65),
        ] {
            let pair = generate_keypair(curve);
            assert_eq!(pair.secret.len(), scalar, "{:?} secret", curve);
            assert_eq!(pair.public_point.len(), point, "{:?} point", curve);
            assert_eq!(pair.public_point[0], 0x04);
        }
    }

    #[test]
    fn test_sign_verifies_with_kernel_crate() {
        let pair = generate_keypair(CurveId::P256);
        let prehash = [0x5Au8; 32];
        let (r, s) = sign_prehash(CurveId::P256, &pair.secret, &prehash).unwrap();
        assert_eq!(r.len(), 32);
        assert_eq!(s.len(), 32);

        let signature = p256::ecdsa::Signature::from_scalars(
            *p256::FieldBytes::from_slice(&r),
            *p256::FieldBytes::from_slice(&s),
        )
        .unwrap();
        let key = p256::ecdsa::SigningKey::from_slice(&pair.secret).unwrap();
        key.verifying_key()
            .verify_prehash(&prehash, &signature)
            .unwrap();
    }

    #[test]
    fn test_p192_sign_verifies_with_kernel_crate() {
        let pair = generate_keypair(CurveId::P192);
        let prehash = [0x9Du8; 20];
        let (r, s) = sign_prehash(CurveId::P192, &pair.secret, &prehash).unwrap();
        assert_eq!(r.len(), 24);
        assert_eq!(s.len(), 24);

        let signature = p192::ecdsa::Signature::from_scalars(
            *p192::FieldBytes::from_slice(&r),
            *p192::FieldBytes::from_slice(&s),
        )
        .unwrap();
        let key = p192::ecdsa::VerifyingKey::from_sec1_bytes(&pair.public_point).unwrap();
        key.verify_prehash(&prehash, &signature).unwrap();
    }

    #[test]
    fn test_der_matches_kernel_encoder_p256() {
        let pair = generate_keypair(CurveId::P256);
        let key = p256::ecdsa::SigningKey::from_slice(&pair.secret).unwrap();
        let prehash = [0xC3u8; 32];
        let signature: p256::ecdsa::Signature = key.sign_prehash(&prehash).unwrap();

        let (r, s) = signature.split_bytes();
        let encoded = encode_signature_der(&r, &s);
        assert_eq!(encoded, signature.to_der().as_bytes());
    }

    #[test]
    fn test_der_matches_kernel_encoder_p521_long_form() {
        let pair = generate_keypair(CurveId::P521);
        let key = p521::ecdsa::SigningKey::from_slice(&pair.secret).unwrap();
        let prehash = [0x11u8; 64];
        let signature: p521::ecdsa::Signature = key.sign_prehash(&prehash).unwrap();

        let (r, s) = signature.split_bytes();
        let encoded = encode_signature_der(&r, &s);
        assert_eq!(encoded, signature.to_der().as_bytes());
        // 66-byte scalars force the long-form outer length
        assert_eq!(encoded[1], 0x81);
    }

    #[test]
    fn test_der_minimal_integers() {
        // high bit set: a 0x00 prefix is required
        let encoded = encode_signature_der(&[0x80, 0x01], &[0x00, 0x7F]);
        assert_eq!(
            encoded,
            vec![0x30, 0x08, 0x02, 0x03, 0x00, 0x80, 0x01, 0x02, 0x01, 0x7F]
        );

        // all-zero scalar collapses to a single zero octet
        let encoded = encode_signature_der(&[0x00, 0x00], &[0x01]);
        assert_eq!(encoded, vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x01]);
    }

    #[test]
    fn test_ecdh_role_swap() {
        for curve in [CurveId::P192, CurveId::P256, CurveId::P384] {
            let ours = generate_keypair(curve);
            let theirs = generate_keypair(curve);
            let scalar = curve.scalar_len();

            let x1 = derive_shared_x(
                curve,
                &ours.secret,
                &theirs.public_point[1..1 + scalar],
                &theirs.public_point[1 + scalar..],
            )
            .unwrap();
            let x2 = derive_shared_x(
                curve,
                &theirs.secret,
                &ours.public_point[1..1 + scalar],
                &ours.public_point[1 + scalar..],
            )
            .unwrap();
            assert_eq!(x1, x2, "{:?}", curve);
            assert_eq!(x1.len(), scalar);
        }
    }

    #[test]
    fn test_ecdh_rejects_off_curve_point() {
        let ours = generate_keypair(CurveId::P256);
        let theirs = generate_keypair(CurveId::P256);
        let mut y = theirs.public_point[33..].to_vec();
        y[31] ^= 0x01;

        let result = derive_shared_x(
            CurveId::P256,
            &ours.secret,
            &theirs.public_point[1..33],
            &y,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_ecdh_rejects_wrong_coordinate_size() {
        let ours = generate_keypair(CurveId::P256);
        let result = derive_shared_x(CurveId::P256, &ours.secret, &[0u8; 24], &[0u8; 24]);
        assert!(result.is_err());
    }
}
