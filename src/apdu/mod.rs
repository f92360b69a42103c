//! APDU (Application Protocol Data Unit) handling
//!
//! Structs and parsing for ISO 7816-4 short-form command APDUs. The card
//! emulated here speaks short APDUs only (Lc/Le up to 255 bytes); payloads
//! that do not fit a single command arrive chunked at the command level
//! instead (see the two-part DECIPHER path).
//!
//! # Example
//! ```ignore
//! use vmyeid::apdu::{parse_apdu, Response};
//!
//! let raw = &[0x00, 0xCA, 0x01, 0x01, 0x00];
//! let apdu = parse_apdu(raw).unwrap();
//! assert_eq!(apdu.ins, 0xCA);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur during APDU parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApduError {
    #[error("APDU too short: expected at least 4 bytes, got {0}")]
    TooShort(usize),

    #[error("Lc field inconsistent with APDU length")]
    InvalidLength,
}

/// A parsed command APDU
///
/// # Fields
/// - `cla`: Class byte (`0x80` marks the experimental symmetric-cipher class)
/// - `ins`: Instruction byte
/// - `p1`, `p2`: Parameter bytes
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length, `None` if absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u16>,
}

impl Apdu {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create a new APDU with a data field
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Get P1-P2 combined as a u16 (useful for PSO routing)
    pub fn p1p2(&self) -> u16 {
        ((self.p1 as u16) << 8) | (self.p2 as u16)
    }
}

/// Parse raw bytes into a short-form APDU
///
/// Handles the four ISO 7816-4 cases:
/// - Case 1: CLA INS P1 P2
/// - Case 2: CLA INS P1 P2 Le
/// - Case 3: CLA INS P1 P2 Lc Data
/// - Case 4: CLA INS P1 P2 Lc Data Le
///
/// Le = 0 means 256.
pub fn parse_apdu(raw: &[u8]) -> Result<Apdu, ApduError> {
    if raw.len() < 4 {
        return Err(ApduError::TooShort(raw.len()));
    }

    let (cla, ins, p1, p2) = (raw[0], raw[1], raw[2], raw[3]);
    let remaining = &raw[4..];

    // Case 1: header only
    if remaining.is_empty() {
        return Ok(Apdu::new(cla, ins, p1, p2));
    }

    // Case 2: Le only
    if remaining.len() == 1 {
        let le = if remaining[0] == 0 {
            256
        } else {
            remaining[0] as u16
        };
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: Some(le),
        });
    }

    let lc = remaining[0] as usize;

    // Case 3: Lc + data
    if remaining.len() == 1 + lc {
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: None,
        });
    }

    // Case 4: Lc + data + Le
    if remaining.len() == 1 + lc + 1 {
        let le_byte = remaining[1 + lc];
        let le = if le_byte == 0 { 256 } else { le_byte as u16 };
        return Ok(Apdu {
            cla,
            ins,
            p1,
            p2,
            data: remaining[1..1 + lc].to_vec(),
            le: Some(le),
        });
    }

    Err(ApduError::InvalidLength)
}

/// Instruction bytes handled by the applet
pub mod ins {
    pub const MANAGE_SECURITY_ENVIRONMENT: u8 = 0x22;
    pub const PERFORM_SECURITY_OPERATION: u8 = 0x2A;
    pub const ACTIVATE_APPLET: u8 = 0x44;
    pub const GENERATE_KEY: u8 = 0x46;
    pub const GENERAL_AUTHENTICATE: u8 = 0x86;
    pub const GET_DATA: u8 = 0xCA;
    pub const PUT_DATA: u8 = 0xDA;
}
