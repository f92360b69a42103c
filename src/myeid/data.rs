//! GET DATA / PUT DATA surface
//!
//! GET DATA exposes key descriptors, public keys, curve parameters, card
//! identity and file-system records. PUT DATA covers applet
//! initialization, PIN initialization and key upload.

use hex_literal::hex;
use log::{debug, info, warn};

use crate::apdu::{Apdu, Response, SW};
use crate::card::{part, CardFs};

use super::{keys, KeepAlive};

/// Card identification record (GET DATA 0xA0)
const CARD_ID: [u8; 20] = hex!("0A00564D59454944000100000000000000000001");

/// Card capability record (GET DATA 0xAA): max RSA 2048, max EC 521,
/// DES/AES present
const CARD_CAPABILITIES: [u8; 11] = hex!("0800020901010100000001");

/// Handle GET DATA (INS 0xCA)
pub(crate) fn get_data(fs: &CardFs, cmd: &Apdu) -> Result<Response, u16> {
    debug!("GET DATA P1={:02X} P2={:02X}", cmd.p1, cmd.p2);

    if cmd.p1 != 0x01 {
        return Err(SW::REFERENCED_DATA_NOT_FOUND);
    }

    if (cmd.p2 & 0xB0) == 0xB0 {
        let info = fs
            .pin_info(cmd.p2 & 0x0F)
            .ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
        return Ok(Response::data_ready(info.to_vec()));
    }

    if (0x81..=0x85).contains(&cmd.p2) {
        return curve_parameter(fs, cmd.p2);
    }

    match cmd.p2 {
        // RSA key descriptor: CRT algorithm id, modulus bits, exponent bits
        0x00 => {
            let e_len = fs.key_part_len(part::RSA_EXP_PUB);
            if e_len == 0 {
                return Err(SW::REFERENCED_DATA_NOT_FOUND);
            }
            let p_len = fs.key_part_len(part::RSA_P);
            if p_len == 0 {
                return Err(SW::REFERENCED_DATA_NOT_FOUND);
            }
            let e_bits = (e_len * 8) as u16;
            let mod_bits = (p_len * 16) as u16;
            let mut out = vec![0x92, 0x00];
            out.extend_from_slice(&e_bits.to_be_bytes());
            out.extend_from_slice(&mod_bits.to_be_bytes());
            Ok(Response::data_ready(out))
        }
        // modulus, possibly recombined from its two halves
        0x01 => {
            let modulus = match fs.key_part(part::RSA_MOD) {
                Some(whole) => whole.to_vec(),
                None => {
                    let high = fs
                        .key_part(part::RSA_MOD_HIGH)
                        .ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
                    let low = fs
                        .key_part(part::RSA_MOD_LOW)
                        .ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
                    let mut joined = high.to_vec();
                    joined.extend_from_slice(low);
                    joined
                }
            };
            Ok(Response::data_ready(modulus))
        }
        // public exponent
        0x02 => {
            let exponent = fs
                .key_part(part::RSA_EXP_PUB)
                .ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
            Ok(Response::data_ready(exponent.to_vec()))
        }
        // public EC point
        0x86 => keys::ec_public_key_response(fs, 0x30),
        0xA0 => Ok(Response::data_ready(CARD_ID.to_vec())),
        0xA1..=0xA6 => {
            let listing = fs
                .list_files(cmd.p2)
                .ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
            if listing.is_empty() {
                Ok(Response::ok())
            } else {
                Ok(Response::data_ready(listing))
            }
        }
        0xAA => Ok(Response::data_ready(CARD_CAPABILITIES.to_vec())),
        0xAC => {
            let ac = fs.access_condition();
            Ok(Response::data_ready(ac.to_be_bytes().to_vec()))
        }
        _ => Err(SW::REFERENCED_DATA_NOT_FOUND),
    }
}

/// Curve parameter export (GET DATA 0x81..0x85)
///
/// Bound from the currently selected EC key file; without a private key in
/// the file there is nothing to bind against.
fn curve_parameter(fs: &CardFs, selector: u8) -> Result<Response, u16> {
    let (curve, _) = keys::bind_ec_key(fs).ok_or(SW::REFERENCED_DATA_NOT_FOUND)?;
    let params = curve.params();

    let out: Vec<u8> = match selector {
        0x81 => params.prime.to_vec(),
        0x82 => params.a.to_vec(),
        0x83 => params.b.to_vec(),
        0x84 => {
            let mut generator = params.gx.to_vec();
            generator.extend_from_slice(params.gy);
            generator
        }
        0x85 => params.order.to_vec(),
        _ => return Err(SW::REFERENCED_DATA_NOT_FOUND),
    };
    Ok(Response::data_ready(out))
}

/// Handle PUT DATA (INS 0xDA)
pub(crate) fn put_data(
    fs: &mut CardFs,
    keep_alive: &mut dyn KeepAlive,
    cmd: &Apdu,
) -> Result<Response, u16> {
    debug!("PUT DATA P1={:02X} P2={:02X}", cmd.p1, cmd.p2);

    if cmd.p1 != 0x01 {
        return Err(SW::REFERENCED_DATA_NOT_FOUND);
    }

    match cmd.p2 {
        // initialize applet: filesystem size + MF ACL + application ACL
        0xE0 => {
            if cmd.data.len() != 8 {
                return Err(SW::WRONG_LENGTH);
            }
            info!(
                "initializing applet, filesystem size {}",
                u16::from_be_bytes([cmd.data[0], cmd.data[1]])
            );
            keep_alive.begin_long_operation();
            let mut acl = [0u8; 6];
            acl.copy_from_slice(&cmd.data[2..8]);
            fs.erase(&acl);
            Ok(Response::ok())
        }
        // initialize a PIN
        pin @ 0x01..=0x0E => {
            if cmd.data.len() < 16 || cmd.data.len() > 16 + 7 + 24 {
                return Err(SW::WRONG_LENGTH);
            }
            fs.initialize_pin(pin)?;
            Ok(Response::ok())
        }
        // key upload
        0x80..=0x8B | 0xA0 => keys::upload_key_part(fs, keep_alive, cmd),
        other => {
            warn!("unsupported PUT DATA selector {:02X}", other);
            Err(SW::FUNCTION_NOT_SUPPORTED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::file_type;
    use crate::crypto::curves::CurveId;
    use crate::myeid::IgnoreKeepAlive;

    fn get(p2: u8) -> Apdu {
        Apdu::new(0x00, 0xCA, 0x01, p2)
    }

    fn put(p2: u8, data: &[u8]) -> Apdu {
        Apdu::with_data(0x00, 0xDA, 0x01, p2, data.to_vec())
    }

    #[test]
    fn test_card_id_and_capabilities() {
        let fs = CardFs::new();
        let resp = get_data(&fs, &get(0xA0)).unwrap();
        assert_eq!(resp.data.len(), 20);
        assert_eq!(resp.sw(), 0x6114);

        let resp = get_data(&fs, &get(0xAA)).unwrap();
        assert_eq!(resp.data.len(), 11);
    }

    #[test]
    fn test_wrong_p1() {
        let fs = CardFs::new();
        let cmd = Apdu::new(0x00, 0xCA, 0x02, 0xA0);
        assert_eq!(get_data(&fs, &cmd), Err(SW::REFERENCED_DATA_NOT_FOUND));
    }

    #[test]
    fn test_rsa_descriptor_and_exponent() {
        let mut fs = CardFs::new();
        fs.create_key_file(0x4401, file_type::RSA, 1024);
        assert_eq!(get_data(&fs, &get(0x00)), Err(SW::REFERENCED_DATA_NOT_FOUND));

        fs.write_key_part(part::RSA_EXP_PUB, &[0x01, 0x00, 0x01]).unwrap();
        fs.write_key_part(part::RSA_P, &[0xAA; 64]).unwrap();

        let resp = get_data(&fs, &get(0x00)).unwrap();
        // 0x9200, 24-bit exponent, 1024-bit modulus
        assert_eq!(resp.data, vec![0x92, 0x00, 0x00, 0x18, 0x04, 0x00]);

        let resp = get_data(&fs, &get(0x02)).unwrap();
        assert_eq!(resp.data, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_modulus_from_halves() {
        let mut fs = CardFs::new();
        fs.create_key_file(0x4401, file_type::RSA, 2048);
        fs.write_key_part(part::RSA_MOD_HIGH, &[0x11; 128]).unwrap();
        fs.write_key_part(part::RSA_MOD_LOW, &[0x22; 128]).unwrap();

        let resp = get_data(&fs, &get(0x01)).unwrap();
        assert_eq!(resp.data.len(), 256);
        // 256 staged bytes report as zero
        assert_eq!(resp.sw(), 0x6100);
        assert_eq!(resp.data[0], 0x11);
        assert_eq!(resp.data[255], 0x22);
    }

    #[test]
    fn test_curve_parameters() {
        let mut fs = CardFs::new();
        fs.create_key_file(0x4501, file_type::EC_NIST, 256);
        assert_eq!(get_data(&fs, &get(0x81)), Err(SW::REFERENCED_DATA_NOT_FOUND));

        fs.write_key_part(part::EC_PRIVATE, &[0x55; 32]).unwrap();
        let params = CurveId::P256.params();

        assert_eq!(get_data(&fs, &get(0x81)).unwrap().data, params.prime);
        assert_eq!(get_data(&fs, &get(0x82)).unwrap().data, params.a);
        assert_eq!(get_data(&fs, &get(0x83)).unwrap().data, params.b);
        assert_eq!(get_data(&fs, &get(0x85)).unwrap().data, params.order);

        let generator = get_data(&fs, &get(0x84)).unwrap().data;
        assert_eq!(&generator[..32], params.gx);
        assert_eq!(&generator[32..], params.gy);
    }

    #[test]
    fn test_public_ec_point_as_0x30_template() {
        let mut fs = CardFs::new();
        fs.create_key_file(0x4501, file_type::EC_NIST, 256);
        assert_eq!(get_data(&fs, &get(0x86)), Err(SW::CONDITIONS_NOT_SATISFIED));

        let mut point = vec![0x04];
        point.extend_from_slice(&[0x77; 64]);
        fs.write_key_part(part::EC_PUBLIC, &point).unwrap();

        let resp = get_data(&fs, &get(0x86)).unwrap();
        assert_eq!(resp.data[0], 0x30);
        assert_eq!(resp.data[1], 65);
        assert_eq!(&resp.data[2..], point.as_slice());
    }

    #[test]
    fn test_pin_info_selector() {
        let mut fs = CardFs::new();
        fs.initialize_pin(1).unwrap();
        let resp = get_data(&fs, &get(0xB1)).unwrap();
        assert_eq!(resp.data, vec![3, 3, 3, 3]);
        assert_eq!(get_data(&fs, &get(0xB2)), Err(SW::REFERENCED_DATA_NOT_FOUND));
    }

    #[test]
    fn test_file_listing_and_access_condition() {
        let mut fs = CardFs::new();
        fs.create_key_file(0x4401, file_type::RSA, 1024);

        let resp = get_data(&fs, &get(0xA1)).unwrap();
        assert_eq!(resp.data, vec![0x44, 0x01]);

        let resp = get_data(&fs, &get(0xA3)).unwrap();
        assert_eq!(resp.sw(), SW::SUCCESS);

        let resp = get_data(&fs, &get(0xAC)).unwrap();
        assert_eq!(resp.data, vec![0x00, 0x00]);
    }

    #[test]
    fn test_unknown_selector() {
        let fs = CardFs::new();
        assert_eq!(get_data(&fs, &get(0x42)), Err(SW::REFERENCED_DATA_NOT_FOUND));
    }

    #[test]
    fn test_put_data_initialize_applet() {
        let mut fs = CardFs::new();
        let mut ka = IgnoreKeepAlive;
        fs.create_key_file(0x4401, file_type::RSA, 1024);

        assert_eq!(
            put_data(&mut fs, &mut ka, &put(0xE0, &[0u8; 7])),
            Err(SW::WRONG_LENGTH)
        );

        let body = [0x08, 0x00, 0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03];
        put_data(&mut fs, &mut ka, &put(0xE0, &body)).unwrap();
        assert_eq!(fs.selected(), None);
        assert_eq!(fs.initialization_acl(), [0xFF, 0xFF, 0xFF, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_put_data_initialize_pin_bounds() {
        let mut fs = CardFs::new();
        let mut ka = IgnoreKeepAlive;

        assert_eq!(
            put_data(&mut fs, &mut ka, &put(0x01, &[0u8; 15])),
            Err(SW::WRONG_LENGTH)
        );
        assert_eq!(
            put_data(&mut fs, &mut ka, &put(0x01, &[0u8; 48])),
            Err(SW::WRONG_LENGTH)
        );

        put_data(&mut fs, &mut ka, &put(0x01, &[0u8; 16])).unwrap();
        assert!(fs.pin_info(1).is_some());
    }

    #[test]
    fn test_put_data_unknown_selector() {
        let mut fs = CardFs::new();
        let mut ka = IgnoreKeepAlive;
        assert_eq!(
            put_data(&mut fs, &mut ka, &put(0xC0, &[])),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
    }
}
