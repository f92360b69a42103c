//! Security environment
//!
//! MANAGE SECURITY ENVIRONMENT latches the tuple (operation, algorithm,
//! key file id) that arms the next PERFORM SECURITY OPERATION or GENERAL
//! AUTHENTICATE. The environment is invalidated on every MSE entry, on
//! card reset and on any failed operation; only a fully valid SET leaves
//! it armed.

use log::{debug, warn};

use crate::apdu::{Apdu, Response, SW};

/// Signature algorithm identifiers accepted in CRDO tag 0x80
pub mod algo {
    /// Raw modular exponentiation, input must match the modulus size
    pub const RSA_RAW: u8 = 0x00;
    /// PKCS#1 v1.5 type-1 padding around a caller-supplied DigestInfo
    pub const RSA_DIGEST_INFO: u8 = 0x02;
    /// ECDSA over a raw hash
    pub const ECDSA_RAW: u8 = 0x04;
    /// SHA-1 digest input, DigestInfo prefix added on card
    pub const RSA_SHA1: u8 = 0x12;
}

/// Operation armed by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecOperation {
    Sign,
    Decrypt,
    Encrypt,
    DeriveEcdh,
}

/// The latched security environment
#[derive(Debug, Default)]
pub struct SecurityEnv {
    operation: Option<SecOperation>,
    sign_algo: u8,
    key_file_id: u16,
    iv_present: bool,
}

impl SecurityEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the armed state
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    /// The armed operation, `None` while the environment is invalid
    pub fn operation(&self) -> Option<SecOperation> {
        self.operation
    }

    /// Algorithm byte from CRDO tag 0x80
    pub fn sign_algo(&self) -> u8 {
        self.sign_algo
    }

    /// Private-key file id from CRDO tag 0x81
    pub fn key_file_id(&self) -> u16 {
        self.key_file_id
    }

    /// Whether an initialization-vector CRDO (tag 0x87) was seen
    pub fn iv_present(&self) -> bool {
        self.iv_present
    }

    /// Handle MANAGE SECURITY ENVIRONMENT (INS 0x22)
    pub fn manage(&mut self, cmd: &Apdu) -> Result<Response, u16> {
        // every entry starts from an invalid environment
        self.invalidate();

        debug!("MSE P1={:02X} P2={:02X}", cmd.p1, cmd.p2);

        if cmd.p1 == 0xF3 {
            debug!("restore security environment {:02X}", cmd.p2);
            if !cmd.data.is_empty() {
                return Err(SW::LC_INCONSISTENT_WITH_P1_P2);
            }
            // restore is a stub: the environment stays unset
            return Ok(Response::ok());
        }

        // MyEID 2.1.4 wants P1=0xA4 for ECDH, but some clients send
        // P1=0x41 P2=0xA4; accept the former as an alias of the latter
        let (p1, p2) = if cmd.p1 == 0xA4 {
            (0x41, 0xA4)
        } else {
            (cmd.p1, cmd.p2)
        };

        if p1 != 0x41 && p1 != 0x81 {
            return Err(SW::FUNCTION_NOT_SUPPORTED);
        }

        // concatenation of Control Reference Data Objects
        let mut algo_seen = false;
        let mut key_seen = false;
        let mut sign_algo = 0u8;
        let mut key_file_id = 0u16;
        let mut iv_present = false;

        let body = &cmd.data;
        let mut i = 0;
        while i < body.len() {
            if i + 2 > body.len() {
                return Err(SW::WRONG_DATA);
            }
            let tag = body[i];
            let len = body[i + 1] as usize;
            i += 2;
            if i + len > body.len() {
                return Err(SW::WRONG_DATA);
            }
            let value = &body[i..i + len];
            i += len;

            match tag {
                0x80 => {
                    if len != 1 {
                        return Err(SW::FUNCTION_NOT_SUPPORTED);
                    }
                    match value[0] {
                        algo::RSA_RAW | algo::RSA_DIGEST_INFO | algo::RSA_SHA1
                        | algo::ECDSA_RAW => {}
                        other => {
                            warn!("unsupported algorithm reference {:02X}", other);
                            return Err(SW::FUNCTION_NOT_SUPPORTED);
                        }
                    }
                    sign_algo = value[0];
                    algo_seen = true;
                }
                0x81 => {
                    if len != 2 {
                        return Err(SW::FUNCTION_NOT_SUPPORTED);
                    }
                    key_file_id = u16::from_be_bytes([value[0], value[1]]);
                    key_seen = true;
                }
                // key reference: one key per file, only 0x00 is meaningful
                0x83 | 0x84 => {
                    if len != 1 || value[0] != 0 {
                        return Err(SW::FUNCTION_NOT_SUPPORTED);
                    }
                }
                0x87 => {
                    iv_present = true;
                }
                other => {
                    warn!("unknown CRDO tag {:02X}", other);
                    return Err(SW::WRONG_DATA);
                }
            }
        }

        let operation = match p2 {
            0xB6 => SecOperation::Sign,
            0xB8 => {
                if p1 == 0x81 {
                    SecOperation::Encrypt
                } else {
                    SecOperation::Decrypt
                }
            }
            0xA4 => SecOperation::DeriveEcdh,
            other => {
                warn!("unknown MSE P2 {:02X}", other);
                return Err(SW::FUNCTION_NOT_SUPPORTED);
            }
        };

        if !(algo_seen && key_seen) {
            warn!("MSE missing required CRDOs (algorithm and key file)");
            return Err(SW::FUNCTION_NOT_SUPPORTED);
        }

        self.operation = Some(operation);
        self.sign_algo = sign_algo;
        self.key_file_id = key_file_id;
        self.iv_present = iv_present;
        debug!(
            "security environment armed: {:?} algo {:02X} key file {:04X}",
            operation, sign_algo, key_file_id
        );
        Ok(Response::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mse(p1: u8, p2: u8, body: &[u8]) -> Apdu {
        Apdu::with_data(0x00, 0x22, p1, p2, body.to_vec())
    }

    #[test]
    fn test_set_sign() {
        let mut env = SecurityEnv::new();
        let resp = env
            .manage(&mse(0x41, 0xB6, &[0x80, 0x01, 0x12, 0x81, 0x02, 0x44, 0x01]))
            .unwrap();
        assert_eq!(resp.sw(), SW::SUCCESS);
        assert_eq!(env.operation(), Some(SecOperation::Sign));
        assert_eq!(env.sign_algo(), algo::RSA_SHA1);
        assert_eq!(env.key_file_id(), 0x4401);
    }

    #[test]
    fn test_set_decrypt_and_encrypt() {
        let mut env = SecurityEnv::new();
        env.manage(&mse(0x41, 0xB8, &[0x80, 0x01, 0x02, 0x81, 0x02, 0x44, 0x01]))
            .unwrap();
        assert_eq!(env.operation(), Some(SecOperation::Decrypt));

        env.manage(&mse(0x81, 0xB8, &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x02]))
            .unwrap();
        assert_eq!(env.operation(), Some(SecOperation::Encrypt));
        assert_eq!(env.key_file_id(), 0x4402);
    }

    #[test]
    fn test_ecdh_alias_p1() {
        let mut env = SecurityEnv::new();
        // buggy-client form: P1=0xA4, P2 arbitrary
        env.manage(&mse(0xA4, 0x00, &[0x80, 0x01, 0x04, 0x81, 0x02, 0x45, 0x01]))
            .unwrap();
        assert_eq!(env.operation(), Some(SecOperation::DeriveEcdh));
    }

    #[test]
    fn test_restore_is_a_stub() {
        let mut env = SecurityEnv::new();
        env.manage(&mse(0x41, 0xB6, &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x01]))
            .unwrap();

        let resp = env.manage(&mse(0xF3, 0x00, &[])).unwrap();
        assert_eq!(resp.sw(), SW::SUCCESS);
        // restore does not re-arm
        assert_eq!(env.operation(), None);
    }

    #[test]
    fn test_restore_with_body_rejected() {
        let mut env = SecurityEnv::new();
        assert_eq!(
            env.manage(&mse(0xF3, 0x00, &[0x00])),
            Err(SW::LC_INCONSISTENT_WITH_P1_P2)
        );
    }

    #[test]
    fn test_unknown_algorithm_clears_environment() {
        let mut env = SecurityEnv::new();
        env.manage(&mse(0x41, 0xB6, &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x01]))
            .unwrap();
        assert_eq!(
            env.manage(&mse(0x41, 0xB6, &[0x80, 0x01, 0x7F, 0x81, 0x02, 0x44, 0x01])),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
        assert_eq!(env.operation(), None);
    }

    #[test]
    fn test_missing_required_tags() {
        let mut env = SecurityEnv::new();
        assert_eq!(
            env.manage(&mse(0x41, 0xB6, &[0x80, 0x01, 0x00])),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
        assert_eq!(
            env.manage(&mse(0x41, 0xB6, &[0x81, 0x02, 0x44, 0x01])),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut env = SecurityEnv::new();
        assert_eq!(
            env.manage(&mse(
                0x41,
                0xB6,
                &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x01, 0x99, 0x01, 0x00]
            )),
            Err(SW::WRONG_DATA)
        );
    }

    #[test]
    fn test_nonzero_key_reference_rejected() {
        let mut env = SecurityEnv::new();
        assert_eq!(
            env.manage(&mse(
                0x41,
                0xB6,
                &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x01, 0x83, 0x01, 0x01]
            )),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
    }

    #[test]
    fn test_iv_flag_and_unknown_p1() {
        let mut env = SecurityEnv::new();
        env.manage(&mse(
            0x41,
            0xB8,
            &[0x80, 0x01, 0x00, 0x81, 0x02, 0x44, 0x01, 0x87, 0x00],
        ))
        .unwrap();
        assert!(env.iv_present());

        assert_eq!(
            env.manage(&mse(0x42, 0xB6, &[])),
            Err(SW::FUNCTION_NOT_SUPPORTED)
        );
    }

    #[test]
    fn test_truncated_crdo() {
        let mut env = SecurityEnv::new();
        assert_eq!(
            env.manage(&mse(0x41, 0xB6, &[0x80, 0x05, 0x00])),
            Err(SW::WRONG_DATA)
        );
        assert_eq!(env.manage(&mse(0x41, 0xB6, &[0x80])), Err(SW::WRONG_DATA));
    }
}
