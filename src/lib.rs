//! Virtual MyEID-compatible cryptographic smart card.
//!
//! This crate emulates the cryptographic command surface of a MyEID PKI
//! applet: it accepts ISO 7816-4 APDUs and performs RSA sign/decrypt,
//! ECDSA signing, ECDH key agreement and single-block DES/AES operations
//! against an in-memory, file-backed key store.
//!
//! The main entry point is [`MyEidApplet`]: feed it parsed [`apdu::Apdu`]
//! commands and it answers [`apdu::Response`] frames carrying the data and
//! status words a real card would put on the wire.
//!
//! # Example
//! ```ignore
//! use vmyeid::apdu::parse_apdu;
//! use vmyeid::MyEidApplet;
//!
//! let mut card = MyEidApplet::new();
//! // MANAGE SECURITY ENVIRONMENT: arm a SHA-1 signature with key file 4401
//! let mse = parse_apdu(&[0x00, 0x22, 0x41, 0xB6, 0x0A,
//!                        0x80, 0x01, 0x12, 0x81, 0x02, 0x44, 0x01,
//!                        0x83, 0x01, 0x00]).unwrap();
//! let resp = card.process_apdu(&mse);
//! assert_eq!(resp.sw(), 0x9000);
//! ```
//!
//! Command transport (T=0/T=1 framing, GET RESPONSE handling) and the
//! persistence of the file system are left to the embedding application.

pub mod apdu;
pub mod card;
pub mod crypto;
pub mod myeid;
pub mod tlv;

pub use myeid::{IgnoreKeepAlive, KeepAlive, MyEidApplet};
