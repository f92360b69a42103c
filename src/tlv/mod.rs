//! BER-TLV handling
//!
//! The MyEID command set uses a deliberately small slice of BER-TLV:
//! single-byte tags with either a one-byte length (0..=127) or the
//! `0x81 LL` long form (0..=255). The parser rejects everything outside
//! that slice, matching the card's behavior.

mod encoder;
mod parser;

pub use encoder::{encode_length, TlvBuilder};
pub use parser::{parse_exact, Tlv, TlvError, TlvReader};
