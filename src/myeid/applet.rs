//! MyEID applet dispatcher
//!
//! Routes incoming APDUs to the security-environment machine, the PSO
//! executors (sign, decrypt, encrypt), the ECDH responder, key generation
//! and the data surface. Holds the per-session state: the security
//! environment and the staged first fragment of a two-part decipher.

use hex_literal::hex;
use log::{debug, warn};

use crate::apdu::{ins, Apdu, Response, SW};
use crate::card::{file_type, part, CardFs};
use crate::crypto::rsa::CrtParts;
use crate::crypto::{ec, rsa, symmetric};
use crate::tlv::{parse_exact, TlvReader};

use super::security_env::{algo, SecOperation, SecurityEnv};
use super::{data, keys, IgnoreKeepAlive, KeepAlive};

/// DER DigestInfo prefix for SHA-1
const SHA1_DIGEST_INFO: [u8; 15] = hex!("3021300906052B0E03021A05000414");

/// Class byte gating the experimental DES/AES operations
const CLA_EXPERIMENTAL: u8 = 0x80;

/// Formatting pre-pass applied before the RSA private-key transformation
enum RsaFormat {
    /// Input must already match the modulus size
    Raw,
    /// PKCS#1 v1.5 type-1 padding around a caller-supplied DigestInfo
    DigestInfo,
    /// 20-byte SHA-1 digest; the DigestInfo prefix is added on card
    Sha1,
}

/// The card applet
///
/// Feed parsed APDUs through [`MyEidApplet::process_apdu`]; every call
/// answers a complete [`Response`]. File and key management for test
/// setups goes through [`MyEidApplet::fs_mut`].
pub struct MyEidApplet {
    fs: CardFs,
    security_env: SecurityEnv,
    staged_decipher: Option<Vec<u8>>,
    keep_alive: Box<dyn KeepAlive>,
}

impl MyEidApplet {
    /// Create an applet with no transport attached
    pub fn new() -> Self {
        Self::with_keep_alive(Box::new(IgnoreKeepAlive))
    }

    /// Create an applet that signals long operations to the given sink
    pub fn with_keep_alive(keep_alive: Box<dyn KeepAlive>) -> Self {
        Self {
            fs: CardFs::new(),
            security_env: SecurityEnv::new(),
            staged_decipher: None,
            keep_alive,
        }
    }

    /// The backing file system
    pub fn fs(&self) -> &CardFs {
        &self.fs
    }

    /// Mutable access to the backing file system
    pub fn fs_mut(&mut self) -> &mut CardFs {
        &mut self.fs
    }

    /// Reset the session state (card reset / power cycle)
    pub fn reset(&mut self) {
        self.security_env.invalidate();
        self.staged_decipher = None;
    }

    /// Process one command APDU
    pub fn process_apdu(&mut self, cmd: &Apdu) -> Response {
        debug!(
            "APDU CLA={:02X} INS={:02X} P1={:02X} P2={:02X} Lc={}",
            cmd.cla,
            cmd.ins,
            cmd.p1,
            cmd.p2,
            cmd.data.len()
        );

        // a staged decipher fragment only survives into its own continuation
        let staged = self.staged_decipher.take();

        let result = match cmd.ins {
            ins::MANAGE_SECURITY_ENVIRONMENT => self.security_env.manage(cmd),
            ins::PERFORM_SECURITY_OPERATION => {
                let result = self.perform_security_operation(cmd, staged);
                if result.is_err() {
                    self.security_env.invalidate();
                }
                result
            }
            ins::GENERAL_AUTHENTICATE => {
                let result = self.ecdh_derive(cmd);
                if result.is_err() {
                    self.security_env.invalidate();
                }
                result
            }
            ins::GENERATE_KEY => keys::generate_key(&mut self.fs, &mut *self.keep_alive, cmd),
            ins::GET_DATA => data::get_data(&self.fs, cmd),
            ins::PUT_DATA => data::put_data(&mut self.fs, &mut *self.keep_alive, cmd),
            ins::ACTIVATE_APPLET => {
                self.fs.set_lifecycle_operational();
                Ok(Response::ok())
            }
            other => {
                warn!("unsupported instruction {:02X}", other);
                Err(SW::INS_NOT_SUPPORTED)
            }
        };

        match result {
            Ok(response) => response,
            Err(sw) => {
                debug!("command failed with {:04X}", sw);
                Response::error(sw)
            }
        }
    }

    /// PERFORM SECURITY OPERATION (INS 0x2A)
    fn perform_security_operation(
        &mut self,
        cmd: &Apdu,
        staged: Option<Vec<u8>>,
    ) -> Result<Response, u16> {
        let key_file_id = match self.security_env.operation() {
            Some(_) => self.security_env.key_file_id(),
            None => return Err(SW::CONDITIONS_NOT_SATISFIED),
        };
        if self.fs.selected() != Some(key_file_id) {
            warn!("selected file does not match the security environment");
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }

        if cmd.p1 == 0x9E && cmd.p2 == 0x9A {
            return self.pso_sign(cmd);
        }
        if cmd.p1 == 0x80 {
            return self.pso_decrypt(cmd, staged);
        }
        if cmd.p1 == 0x84 {
            return self.pso_encrypt(cmd);
        }
        Err(SW::INCORRECT_P1_P2)
    }

    fn pso_sign(&mut self, cmd: &Apdu) -> Result<Response, u16> {
        if cmd.data.is_empty() {
            return Err(SW::WRONG_LENGTH);
        }
        if self.security_env.operation() != Some(SecOperation::Sign) {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }

        match self.security_env.sign_algo() {
            algo::ECDSA_RAW => {
                self.keep_alive.begin_long_operation();
                self.sign_ecdsa(&cmd.data)
            }
            a @ (algo::RSA_RAW | algo::RSA_DIGEST_INFO | algo::RSA_SHA1) => {
                let format = match a {
                    algo::RSA_RAW => RsaFormat::Raw,
                    algo::RSA_DIGEST_INFO => RsaFormat::DigestInfo,
                    _ => RsaFormat::Sha1,
                };
                self.keep_alive.begin_long_operation();
                let signature = self.rsa_private_transform(&cmd.data, format)?;
                Ok(Response::data_ready(signature))
            }
            _ => Err(SW::FUNCTION_NOT_SUPPORTED),
        }
    }

    fn sign_ecdsa(&self, data: &[u8]) -> Result<Response, u16> {
        let (curve, secret) = keys::bind_ec_key(&self.fs).ok_or(SW::CONDITIONS_NOT_SATISFIED)?;
        let scalar = curve.scalar_len();
        // an oversized hash keeps its leftmost scalar-size bytes
        let prehash = if data.len() > scalar {
            &data[..scalar]
        } else {
            data
        };
        let (r, s) = ec::sign_prehash(curve, &secret, prehash).map_err(|e| {
            warn!("ECDSA signing failed: {}", e);
            SW::CONDITIONS_NOT_SATISFIED
        })?;
        Ok(Response::data_ready(ec::encode_signature_der(&r, &s)))
    }

    /// The RSA formatting pre-pass plus the private-key transformation
    ///
    /// On kernel failure the formatted message buffer is wiped before the
    /// error surfaces.
    fn rsa_private_transform(&self, input: &[u8], format: RsaFormat) -> Result<Vec<u8>, u16> {
        let modulus_size = self.fs.key_part_len(part::RSA_P) * 2;
        if modulus_size == 0 {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }

        let mut message = match format {
            RsaFormat::Raw => {
                if input.len() != modulus_size {
                    warn!(
                        "raw input is {} bytes, modulus is {}",
                        input.len(),
                        modulus_size
                    );
                    return Err(SW::CONDITIONS_NOT_SATISFIED);
                }
                input.to_vec()
            }
            RsaFormat::Sha1 => {
                if input.len() != 20 {
                    return Err(SW::CONDITIONS_NOT_SATISFIED);
                }
                let mut digest_info = SHA1_DIGEST_INFO.to_vec();
                digest_info.extend_from_slice(input);
                pkcs1_type1_pad(&digest_info, modulus_size)?
            }
            RsaFormat::DigestInfo => pkcs1_type1_pad(input, modulus_size)?,
        };

        let parts = CrtParts {
            p: self.fs.key_part(part::RSA_P).ok_or(SW::CONDITIONS_NOT_SATISFIED)?,
            q: self.fs.key_part(part::RSA_Q).ok_or(SW::CONDITIONS_NOT_SATISFIED)?,
            dp: self.fs.key_part(part::RSA_DP).ok_or(SW::CONDITIONS_NOT_SATISFIED)?,
            dq: self.fs.key_part(part::RSA_DQ).ok_or(SW::CONDITIONS_NOT_SATISFIED)?,
            qinv: self
                .fs
                .key_part(part::RSA_QINV)
                .ok_or(SW::CONDITIONS_NOT_SATISFIED)?,
        };

        match rsa::raw_private(&parts, &message) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!("RSA kernel failed: {}", e);
                message.fill(0);
                Err(SW::CONDITIONS_NOT_SATISFIED)
            }
        }
    }

    fn pso_decrypt(&mut self, cmd: &Apdu, staged: Option<Vec<u8>>) -> Result<Response, u16> {
        if self.security_env.operation() != Some(SecOperation::Decrypt) {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }
        if cmd.data.is_empty() {
            return Err(SW::INVALID_DATA);
        }

        // P2 0x84 carries bare ciphertext, 0x86 prepends a padding
        // indicator that also drives the two-part assembly
        let input: Vec<u8> = match cmd.p2 {
            0x84 => cmd.data.clone(),
            0x86 => {
                let indicator = cmd.data[0];
                let rest = &cmd.data[1..];
                match indicator {
                    0x00 => rest.to_vec(),
                    0x81 => {
                        debug!("staging first decipher fragment ({} bytes)", rest.len());
                        self.staged_decipher = Some(rest.to_vec());
                        return Ok(Response::ok());
                    }
                    0x82 => {
                        let mut joined = staged.ok_or_else(|| {
                            warn!("decipher continuation without a first fragment");
                            SW::INVALID_DATA
                        })?;
                        if joined.len() + rest.len() > 256 {
                            warn!("joined ciphertext exceeds 256 bytes");
                            return Err(SW::INVALID_DATA);
                        }
                        joined.extend_from_slice(rest);
                        joined
                    }
                    other => {
                        warn!("unknown padding indicator {:02X}", other);
                        return Err(SW::INVALID_DATA);
                    }
                }
            }
            _ => return Err(SW::INCORRECT_P1_P2),
        };

        self.decipher(cmd.cla, &input)
    }

    fn decipher(&mut self, cla: u8, input: &[u8]) -> Result<Response, u16> {
        // a symmetric key in the selected file routes to DES/AES
        if self.fs.key_part_len(part::SYMMETRIC) != 0 {
            if cla != CLA_EXPERIMENTAL {
                return Err(SW::FUNCTION_NOT_SUPPORTED);
            }
            return self.symmetric_cipher(input, true);
        }

        self.keep_alive.begin_long_operation();
        let mut output = self.rsa_private_transform(input, RsaFormat::Raw)?;

        if self.security_env.sign_algo() == algo::RSA_DIGEST_INFO {
            output = strip_pkcs1_type2(output)?;
        }
        Ok(Response::data_ready(output))
    }

    fn pso_encrypt(&mut self, cmd: &Apdu) -> Result<Response, u16> {
        if self.security_env.operation() != Some(SecOperation::Encrypt) {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }
        // P2 0x80: data field carries the plaintext
        if cmd.p2 != 0x80 {
            return Err(SW::INVALID_DATA);
        }
        if cmd.data.is_empty() {
            return Err(SW::INVALID_DATA);
        }
        if cmd.cla != CLA_EXPERIMENTAL {
            return Err(SW::FUNCTION_NOT_SUPPORTED);
        }
        self.symmetric_cipher(&cmd.data, false)
    }

    fn symmetric_cipher(&mut self, block: &[u8], decrypt: bool) -> Result<Response, u16> {
        let key = self
            .fs
            .key_part(part::SYMMETRIC)
            .ok_or(SW::INCORRECT_FILE_TYPE)?
            .to_vec();

        match self.fs.file_type() {
            Some(file_type::DES) => {
                if !matches!(key.len(), 7 | 8 | 16 | 24) {
                    return Err(SW::INCORRECT_FILE_TYPE);
                }
                if block.len() != symmetric::DES_BLOCK {
                    return Err(SW::WRONG_LENGTH);
                }
                let out = symmetric::des_cipher_block(&key, block, decrypt)
                    .map_err(|_| SW::INCORRECT_FILE_TYPE)?;
                Ok(Response::data_ready(out))
            }
            Some(file_type::AES) => {
                if block.len() != symmetric::AES_BLOCK {
                    return Err(SW::WRONG_LENGTH);
                }
                let out = symmetric::aes_cipher_block(&key, block, decrypt)
                    .map_err(|_| SW::INCORRECT_FILE_TYPE)?;
                Ok(Response::data_ready(out))
            }
            _ => Err(SW::INCORRECT_FILE_TYPE),
        }
    }

    /// GENERAL AUTHENTICATE (INS 0x86): X-coordinate ECDH
    fn ecdh_derive(&mut self, cmd: &Apdu) -> Result<Response, u16> {
        if cmd.p1 != 0 || cmd.p2 != 0 {
            return Err(SW::INCORRECT_P1_P2);
        }
        if self.security_env.operation() != Some(SecOperation::DeriveEcdh) {
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }
        if self.fs.selected() != Some(self.security_env.key_file_id()) {
            warn!("selected file does not match the security environment");
            return Err(SW::CONDITIONS_NOT_SATISFIED);
        }
        if cmd.data.len() < 3 {
            return Err(SW::INVALID_DATA);
        }

        // Dynamic Authentication Template wrapping the peer point
        let template = parse_exact(&cmd.data).map_err(|_| SW::INVALID_DATA)?;
        if template.tag != 0x7C {
            return Err(SW::INVALID_DATA);
        }

        let mut point: Option<&[u8]> = None;
        let mut reader = TlvReader::new(template.value);
        while let Some(item) = reader.read() {
            let tlv = item.map_err(|_| SW::INVALID_DATA)?;
            match tlv.tag {
                // optional key identifier, skipped
                0x80 => {}
                0x85 => {
                    if reader.remaining() != 0 {
                        return Err(SW::INVALID_DATA);
                    }
                    point = Some(tlv.value);
                }
                other => {
                    warn!("unexpected tag {:02X} in authentication template", other);
                    return Err(SW::INVALID_DATA);
                }
            }
        }

        let point = point.ok_or(SW::INVALID_DATA)?;
        let (&indicator, coordinates) = point.split_first().ok_or(SW::INVALID_DATA)?;
        if indicator != 0x04 {
            return Err(SW::INVALID_DATA);
        }

        let (curve, secret) = keys::bind_ec_key(&self.fs).ok_or(SW::CONDITIONS_NOT_SATISFIED)?;
        let scalar = curve.scalar_len();
        if coordinates.len() != 2 * scalar {
            warn!(
                "peer point is {} bytes, curve needs {}",
                coordinates.len(),
                2 * scalar
            );
            return Err(SW::INVALID_DATA);
        }

        self.keep_alive.begin_long_operation();
        let shared_x = ec::derive_shared_x(
            curve,
            &secret,
            &coordinates[..scalar],
            &coordinates[scalar..],
        )
        .map_err(|e| {
            warn!("ECDH derivation failed: {}", e);
            SW::CONDITIONS_NOT_SATISFIED
        })?;

        Ok(Response::data_ready(shared_x))
    }
}

impl Default for MyEidApplet {
    fn default() -> Self {
        Self::new()
    }
}

/// PKCS#1 v1.5 type-1 padding: `00 01 FF..FF 00 msg` with at least 8 FFs
fn pkcs1_type1_pad(msg: &[u8], modulus_size: usize) -> Result<Vec<u8>, u16> {
    if msg.len() + 11 > modulus_size {
        warn!(
            "message of {} bytes cannot be padded into {} bytes",
            msg.len(),
            modulus_size
        );
        return Err(SW::CONDITIONS_NOT_SATISFIED);
    }
    let mut out = vec![0x00, 0x01];
    out.extend(std::iter::repeat(0xFF).take(modulus_size - msg.len() - 3));
    out.push(0x00);
    out.extend_from_slice(msg);
    Ok(out)
}

/// Strip PKCS#1 v1.5 type-2 padding: `00 02 <8+ nonzero bytes> 00 payload`
fn strip_pkcs1_type2(block: Vec<u8>) -> Result<Vec<u8>, u16> {
    if block.len() <= 11 || block[0] != 0x00 || block[1] != 0x02 {
        warn!("block does not carry type-2 padding");
        return Err(SW::CONDITIONS_NOT_SATISFIED);
    }
    match block[2..].iter().position(|&b| b == 0) {
        Some(idx) if idx >= 8 => Ok(block[idx + 3..].to_vec()),
        Some(_) => {
            warn!("fewer than 8 bytes of random padding");
            Err(SW::CONDITIONS_NOT_SATISFIED)
        }
        None => {
            warn!("no 0x00 terminator after the random padding");
            Err(SW::CONDITIONS_NOT_SATISFIED)
        }
    }
}
