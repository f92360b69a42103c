//! Key generation and key upload
//!
//! GENERATE KEY produces RSA CRT keys (fixed public exponent 65537) or EC
//! key pairs, persisting the parts into the selected file. Key upload
//! (PUT DATA with a part-id P2) validates each part's byte length against
//! the file's declared key size before storing it.

use log::{debug, info, warn};

use crate::apdu::{Apdu, Response, SW};
use crate::card::{file_type, part, CardFs};
use crate::crypto::curves::CurveId;
use crate::crypto::{ec, rsa};
use crate::tlv::encode_length;

use super::KeepAlive;

/// Bind the curve and private scalar of the currently selected EC key file
///
/// secp256k1 files select by their type byte; NIST files by the length of
/// the stored private scalar.
pub(crate) fn bind_ec_key(fs: &CardFs) -> Option<(CurveId, Vec<u8>)> {
    let secret = fs.key_part(part::EC_PRIVATE)?;
    let curve = if fs.file_type() == Some(file_type::EC_SECP256K1) {
        CurveId::Secp256k1
    } else {
        CurveId::from_scalar_len(secret.len())?
    };
    Some((curve, secret.to_vec()))
}

/// Answer the stored public EC point as `tag LL 04 X Y`
pub(crate) fn ec_public_key_response(fs: &CardFs, tag: u8) -> Result<Response, u16> {
    let point = fs
        .key_part(part::EC_PUBLIC)
        .ok_or(SW::CONDITIONS_NOT_SATISFIED)?;
    let mut out = vec![tag];
    out.extend(encode_length(point.len()));
    out.extend_from_slice(point);
    Ok(Response::data_ready(out))
}

fn rsa_key_size_supported(bits: u16) -> bool {
    bits % 64 == 0 && (512..=2048).contains(&bits)
}

fn ec_key_file_supported(bits: u16, file_type_byte: u8) -> bool {
    CurveId::from_file(file_type_byte, bits).is_some()
}

/// Handle GENERATE KEY (INS 0x46)
///
/// The key kind comes from the selected file: type 0x11 generates RSA,
/// 0x22/0x23 an EC pair on the curve matching the file size.
pub(crate) fn generate_key(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    cmd: &Apdu,
) -> Result<Response, u16> {
    debug!("GENERATE KEY P1={:02X} P2={:02X}", cmd.p1, cmd.p2);

    if cmd.p1 != 0 || cmd.p2 != 0 {
        return Err(SW::INCORRECT_P1_P2);
    }

    let file_type_byte = fs.file_type().ok_or(SW::FILE_NOT_FOUND)?;
    if file_type_byte == file_type::RSA {
        return generate_rsa_key(fs, keep_alive, &cmd.data);
    }

    // EC generation takes no command data
    if !cmd.data.is_empty() {
        return Err(SW::CONDITIONS_NOT_SATISFIED);
    }

    let size_bits = fs.file_size().ok_or(SW::FILE_NOT_FOUND)?;
    let curve = CurveId::from_file(file_type_byte, size_bits)
        .ok_or(SW::CONDITIONS_NOT_SATISFIED)?;

    keep_alive.begin_long_operation();
    info!(
        "generating {:?} key in file {:04X}",
        curve,
        fs.selected().unwrap_or(0)
    );

    let pair = ec::generate_keypair(curve);
    fs.write_key_part(part::EC_PRIVATE, &pair.secret)?;
    fs.write_key_part(part::EC_PUBLIC, &pair.public_point)?;

    ec_public_key_response(fs, 0x86)
}

/// RSA CRT generation with the fixed public exponent 65537
fn generate_rsa_key(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    data: &[u8],
) -> Result<Response, u16> {
    // the optional body must spell out the only accepted public exponent:
    // SEQUENCE { INTEGER 65537 }, with 0x81 tolerated for the integer tag
    if !data.is_empty() {
        if data.len() != 7
            || data[0] != 0x30
            || data[1] != 0x05
            || (data[2] != 0x81 && data[2] != 0x02)
            || data[3] != 0x03
            || data[4..7] != [0x01, 0x00, 0x01]
        {
            warn!("rejecting RSA generation with exponent data {:02X?}", data);
            return Err(SW::INVALID_DATA);
        }
    }

    let size_bits = fs.file_size().ok_or(SW::FILE_NOT_FOUND)?;
    if !rsa_key_size_supported(size_bits) {
        return Err(SW::INCORRECT_FILE_TYPE);
    }

    keep_alive.begin_long_operation();
    info!(
        "generating RSA-{} key in file {:04X}",
        size_bits,
        fs.selected().unwrap_or(0)
    );

    let key = rsa::generate(size_bits as usize).map_err(|e| {
        warn!("RSA generation failed: {}", e);
        SW::FILE_NOT_FOUND
    })?;

    fs.write_key_part(part::RSA_P, &key.p)?;
    fs.write_key_part(part::RSA_Q, &key.q)?;
    fs.write_key_part(part::RSA_DP, &key.dp)?;
    fs.write_key_part(part::RSA_DQ, &key.dq)?;
    fs.write_key_part(part::RSA_QINV, &key.qinv)?;

    if size_bits == 2048 {
        // a 2048-bit modulus is persisted as two 128-byte halves
        fs.write_key_part(part::RSA_MOD_HIGH, &key.modulus[..128])?;
        fs.write_key_part(part::RSA_MOD_LOW, &key.modulus[128..])?;
    } else {
        fs.write_key_part(part::RSA_MOD, &key.modulus)?;
    }
    fs.write_key_part(part::RSA_EXP_PUB, &key.public_exponent)?;

    // the plain big-endian modulus goes back to the host
    Ok(Response::data_ready(key.modulus))
}

/// Handle a key-part upload (PUT DATA with P2 in 0x80..=0x8B or 0xA0)
pub(crate) fn upload_key_part(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    cmd: &Apdu,
) -> Result<Response, u16> {
    let size_bits = match fs.file_size() {
        Some(bits) if bits != 0 => bits,
        _ => return Err(SW::FILE_NOT_FOUND),
    };
    let file_type_byte = fs.file_type().ok_or(SW::FILE_NOT_FOUND)?;
    debug!(
        "key upload part {:02X}, file type {:02X}, {} bits",
        cmd.p2, file_type_byte, size_bits
    );

    match file_type_byte {
        file_type::DES => {
            if !matches!(size_bits, 56 | 64 | 128 | 192) {
                return Err(SW::WRONG_LENGTH);
            }
            if cmd.data.len() * 8 != size_bits as usize {
                return Err(SW::WRONG_LENGTH);
            }
            fs.write_key_part(cmd.p2, &cmd.data)?;
            Ok(Response::ok())
        }
        file_type::AES => {
            if !matches!(size_bits, 128 | 192 | 256) {
                return Err(SW::WRONG_LENGTH);
            }
            if cmd.data.len() * 8 != size_bits as usize {
                return Err(SW::WRONG_LENGTH);
            }
            fs.write_key_part(cmd.p2, &cmd.data)?;
            Ok(Response::ok())
        }
        t if ec_key_file_supported(size_bits, t) => upload_ec_key(fs, keep_alive, cmd, size_bits),
        file_type::RSA if rsa_key_size_supported(size_bits) => {
            upload_rsa_key(fs, keep_alive, cmd, size_bits)
        }
        _ => Err(SW::INCORRECT_FILE_TYPE),
    }
}

fn upload_ec_key(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    cmd: &Apdu,
    size_bits: u16,
) -> Result<Response, u16> {
    let file_type_byte = fs.file_type().ok_or(SW::FILE_NOT_FOUND)?;
    let curve =
        CurveId::from_file(file_type_byte, size_bits).ok_or(SW::CONDITIONS_NOT_SATISFIED)?;
    let scalar = curve.scalar_len();

    let (part_id, expected_len) = match cmd.p2 {
        part::EC_PRIVATE => (part::EC_PRIVATE, scalar),
        part::EC_PUBLIC => (part::EC_PUBLIC, 1 + 2 * scalar),
        _ => return Err(SW::CONDITIONS_NOT_SATISFIED),
    };
    if cmd.data.len() != expected_len {
        warn!(
            "EC part {:02X} length {} does not match curve size {}",
            cmd.p2,
            cmd.data.len(),
            expected_len
        );
        return Err(SW::CONDITIONS_NOT_SATISFIED);
    }

    keep_alive.begin_long_operation();
    fs.write_key_part(part_id, &cmd.data)?;
    Ok(Response::ok())
}

fn upload_rsa_key(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    cmd: &Apdu,
    size_bits: u16,
) -> Result<Response, u16> {
    let mut body: &[u8] = &cmd.data;

    // CRT parts may carry one leading 0x00 (65 bytes for a 1024-bit key)
    if body.len() % 2 == 1 && cmd.p2 != part::RSA_EXP_PUB {
        if body.first() != Some(&0) {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }
        body = &body[1..];
    }

    match cmd.p2 {
        part::RSA_P
        | part::RSA_Q
        | part::RSA_DP
        | part::RSA_DQ
        | part::RSA_QINV
        | part::RSA_MOD_HIGH
        | part::RSA_MOD_LOW => {
            if body.len() * 16 != size_bits as usize {
                return Err(SW::CONDITIONS_NOT_SATISFIED);
            }
        }
        part::RSA_MOD => {
            if body.len() * 8 != size_bits as usize {
                return Err(SW::CONDITIONS_NOT_SATISFIED);
            }
        }
        // the private exponent is not needed for CRT; accept and discard
        part::RSA_EXP | part::RSA_EXP_HIGH | part::RSA_EXP_LOW => {
            return Ok(Response::ok());
        }
        part::RSA_EXP_PUB => {}
        _ => return Err(SW::CONDITIONS_NOT_SATISFIED),
    }

    keep_alive.begin_long_operation();
    fs.write_key_part(cmd.p2, body)?;
    Ok(Response::ok())
}
