//! Curve catalogue
//!
//! The curves a key file can hold, their scalar sizes, the selection rules
//! tying file type and key size to a curve, and the domain parameters the
//! card exposes through GET DATA. Parameters are big-endian and padded to
//! the curve's scalar size.

use hex_literal::hex;

use crate::card::file_type;

/// Supported curves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveId {
    P192,
    P256,
    P384,
    P521,
    Secp256k1,
}

/// Domain parameters of one curve, big-endian
#[derive(Debug)]
pub struct CurveParams {
    pub prime: &'static [u8],
    pub a: &'static [u8],
    pub b: &'static [u8],
    pub gx: &'static [u8],
    pub gy: &'static [u8],
    pub order: &'static [u8],
}

impl CurveId {
    /// Scalar (and coordinate) size in bytes
    pub fn scalar_len(self) -> usize {
        match self {
            CurveId::P192 => 24,
            CurveId::P256 | CurveId::Secp256k1 => 32,
            CurveId::P384 => 48,
            CurveId::P521 => 66,
        }
    }

    /// Select a NIST curve by private-scalar length
    pub fn from_scalar_len(len: usize) -> Option<Self> {
        match len {
            24 => Some(CurveId::P192),
            32 => Some(CurveId::P256),
            48 => Some(CurveId::P384),
            66 => Some(CurveId::P521),
            _ => None,
        }
    }

    /// Select a curve from a key file's type and declared size in bits
    pub fn from_file(file_type_byte: u8, size_bits: u16) -> Option<Self> {
        match file_type_byte {
            file_type::EC_SECP256K1 if size_bits == 256 => Some(CurveId::Secp256k1),
            file_type::EC_NIST => match size_bits {
                192 => Some(CurveId::P192),
                256 => Some(CurveId::P256),
                384 => Some(CurveId::P384),
                521 => Some(CurveId::P521),
                _ => None,
            },
            _ => None,
        }
    }

    /// Domain parameters for GET DATA and parameter export
    pub fn params(self) -> &'static CurveParams {
        match self {
            CurveId::P192 => &P192_PARAMS,
            CurveId::P256 => &P256_PARAMS,
            CurveId::P384 => &P384_PARAMS,
            CurveId::P521 => &P521_PARAMS,
            CurveId::Secp256k1 => &SECP256K1_PARAMS,
        }
    }
}

static P192_PARAMS: CurveParams = CurveParams {
    prime: &hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFFFFFFFFFFFF"),
    a: &hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFFFFFFFFFFFC"),
    b: &hex!("64210519E59C80E70FA7E9AB72243049FEB8DEECC146B9B1"),
    gx: &hex!("188DA80EB03090F67CBF20EB43A18800F4FF0AFD82FF1012"),
    gy: &hex!("07192B95FFC8DA78631011ED6B24CDD573F977A11E794811"),
    order: &hex!("FFFFFFFFFFFFFFFFFFFFFFFF99DEF836146BC9B1B4D22831"),
};

static P256_PARAMS: CurveParams = CurveParams {
    prime: &hex!("FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFF"),
    a: &hex!("FFFFFFFF00000001000000000000000000000000FFFFFFFFFFFFFFFFFFFFFFFC"),
    b: &hex!("5AC635D8AA3A93E7B3EBBD55769886BC651D06B0CC53B0F63BCE3C3E27D2604B"),
    gx: &hex!("6B17D1F2E12C4247F8BCE6E563A440F277037D812DEB33A0F4A13945D898C296"),
    gy: &hex!("4FE342E2FE1A7F9B8EE7EB4A7C0F9E162BCE33576B315ECECBB6406837BF51F5"),
    order: &hex!("FFFFFFFF00000000FFFFFFFFFFFFFFFFBCE6FAADA7179E84F3B9CAC2FC632551"),
};

static P384_PARAMS: CurveParams = CurveParams {
    prime: &hex!(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "FFFFFFFFFFFFFFFEFFFFFFFF0000000000000000FFFFFFFF"
    ),
    a: &hex!(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "FFFFFFFFFFFFFFFEFFFFFFFF0000000000000000FFFFFFFC"
    ),
    b: &hex!(
        "B3312FA7E23EE7E4988E056BE3F82D19181D9C6EFE814112"
        "0314088F5013875AC656398D8A2ED19D2A85C8EDD3EC2AEF"
    ),
    gx: &hex!(
        "AA87CA22BE8B05378EB1C71EF320AD746E1D3B628BA79B98"
        "59F741E082542A385502F25DBF55296C3A545E3872760AB7"
    ),
    gy: &hex!(
        "3617DE4A96262C6F5D9E98BF9292DC29F8F41DBD289A147C"
        "E9DA3113B5F0B8C00A60B1CE1D7E819D7A431D7C90EA0E5F"
    ),
    order: &hex!(
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "C7634D81F4372DDF581A0DB248B0A77AECEC196ACCC52973"
    ),
};

static P521_PARAMS: CurveParams = CurveParams {
    prime: &hex!(
        "01FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
    ),
    a: &hex!(
        "01FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFC"
    ),
    b: &hex!(
        "0051953EB9618E1C9A1F929A21A0B68540EEA2DA725B99B315F3B8B489918EF1"
        "09E156193951EC7E937B1652C0BD3BB1BF073573DF883D2C34F1EF451FD46B503F00"
    ),
    gx: &hex!(
        "00C6858E06B70404E9CD9E3ECB662395B4429C648139053FB521F828AF606B4D"
        "3DBAA14B5E77EFE75928FE1DC127A2FFA8DE3348B3C1856A429BF97E7E31C2E5BD66"
    ),
    gy: &hex!(
        "011839296A789A3BC0045C8A5FB42C7D1BD998F54449579B446817AFBD17273E"
        "662C97EE72995EF42640C550B9013FAD0761353C7086A272C24088BE94769FD16650"
    ),
    order: &hex!(
        "01FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"
        "FA51868783BF2F966B7FCC0148F709A5D03BB5C9B8899C47AEBB6FB71E91386409"
    ),
};

static SECP256K1_PARAMS: CurveParams = CurveParams {
    prime: &hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F"),
    a: &hex!("0000000000000000000000000000000000000000000000000000000000000000"),
    b: &hex!("0000000000000000000000000000000000000000000000000000000000000007"),
    gx: &hex!("79BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798"),
    gy: &hex!("483ADA7726A3C4655DA4FBFC0E1108A8FD17B448A68554199C47D08FFB10D4B8"),
    order: &hex!("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141"),
};
