//! File-backed key store
//!
//! Key material lives in key files addressed by 16-bit identifiers. Each
//! file carries a type byte, a declared key size in bits, and a set of key
//! *parts* tagged by a part-id byte. All multi-byte numbers are stored
//! big-endian exactly as the caller supplied them.

use std::collections::BTreeMap;

use log::{debug, info};

use crate::apdu::SW;

/// Key part identifiers
///
/// The PUT DATA P2 byte of a key upload doubles as the stored part id.
/// `EC_PUBLIC`/`EC_PRIVATE` share code points with RSA parts and are told
/// apart by the file type.
pub mod part {
    pub const RSA_MOD: u8 = 0x80;
    pub const RSA_EXP_PUB: u8 = 0x81;
    pub const RSA_EXP: u8 = 0x82;
    pub const RSA_P: u8 = 0x83;
    pub const RSA_Q: u8 = 0x84;
    pub const RSA_DP: u8 = 0x85;
    pub const RSA_DQ: u8 = 0x86;
    pub const RSA_QINV: u8 = 0x87;
    /// High half of a split 2048-bit modulus
    pub const RSA_MOD_HIGH: u8 = 0x88;
    /// Low half of a split 2048-bit modulus
    pub const RSA_MOD_LOW: u8 = 0x89;
    pub const RSA_EXP_HIGH: u8 = 0x8A;
    pub const RSA_EXP_LOW: u8 = 0x8B;
    pub const EC_PUBLIC: u8 = 0x86;
    pub const EC_PRIVATE: u8 = 0x87;
    pub const SYMMETRIC: u8 = 0xA0;
}

/// Key file type bytes
pub mod file_type {
    pub const RSA: u8 = 0x11;
    pub const DES: u8 = 0x19;
    pub const EC_NIST: u8 = 0x22;
    /// OsEID-specific secp256k1 key file
    pub const EC_SECP256K1: u8 = 0x23;
    pub const AES: u8 = 0x29;
}

/// Card lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    #[default]
    Creation,
    Operational,
}

/// A key file: type, declared size in bits, and tagged key parts
#[derive(Debug, Clone)]
pub struct KeyFile {
    pub id: u16,
    pub file_type: u8,
    pub size_bits: u16,
    /// Access condition bytes reported through GET DATA 0xAC
    pub access_condition: u16,
    parts: BTreeMap<u8, Vec<u8>>,
}

impl KeyFile {
    fn new(id: u16, file_type: u8, size_bits: u16) -> Self {
        Self {
            id,
            file_type,
            size_bits,
            access_condition: 0x0000,
            parts: BTreeMap::new(),
        }
    }
}

/// PIN record exposed through GET DATA 0xB0..0xBF
#[derive(Debug, Clone, Copy)]
pub struct PinRecord {
    pub attempts_max: u8,
    pub attempts_left: u8,
    pub unblock_max: u8,
    pub unblock_left: u8,
}

impl Default for PinRecord {
    fn default() -> Self {
        Self {
            attempts_max: 3,
            attempts_left: 3,
            unblock_max: 3,
            unblock_left: 3,
        }
    }
}

/// The in-memory file system backing the applet
#[derive(Debug, Default)]
pub struct CardFs {
    files: BTreeMap<u16, KeyFile>,
    selected: Option<u16>,
    pins: BTreeMap<u8, PinRecord>,
    lifecycle: Lifecycle,
    acl: [u8; 6],
}

impl CardFs {
    /// Create an empty store in the creation lifecycle
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key file and select it
    pub fn create_key_file(&mut self, id: u16, file_type: u8, size_bits: u16) {
        debug!(
            "creating key file {:04X} type {:02X} size {} bits",
            id, file_type, size_bits
        );
        self.files.insert(id, KeyFile::new(id, file_type, size_bits));
        self.selected = Some(id);
    }

    /// Select a file by id
    pub fn select(&mut self, id: u16) -> Result<(), u16> {
        if !self.files.contains_key(&id) {
            return Err(SW::FILE_NOT_FOUND);
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Identifier of the currently selected file
    pub fn selected(&self) -> Option<u16> {
        self.selected
    }

    fn selected_file(&self) -> Option<&KeyFile> {
        self.files.get(&self.selected?)
    }

    /// Type byte of the selected file
    pub fn file_type(&self) -> Option<u8> {
        self.selected_file().map(|f| f.file_type)
    }

    /// Declared key size of the selected file, in bits
    pub fn file_size(&self) -> Option<u16> {
        self.selected_file().map(|f| f.size_bits)
    }

    /// Access condition bytes of the selected file
    pub fn access_condition(&self) -> u16 {
        self.selected_file().map(|f| f.access_condition).unwrap_or(0)
    }

    /// Read a key part of the selected file
    pub fn key_part(&self, part: u8) -> Option<&[u8]> {
        self.selected_file()?.parts.get(&part).map(Vec::as_slice)
    }

    /// Length of a key part of the selected file, 0 if absent
    pub fn key_part_len(&self, part: u8) -> usize {
        self.key_part(part).map(|p| p.len()).unwrap_or(0)
    }

    /// Store a key part in the selected file
    pub fn write_key_part(&mut self, part: u8, data: &[u8]) -> Result<(), u16> {
        let id = self.selected.ok_or(SW::FILE_NOT_FOUND)?;
        let file = self.files.get_mut(&id).ok_or(SW::FILE_NOT_FOUND)?;
        debug!(
            "writing key part {:02X} ({} bytes) into file {:04X}",
            part,
            data.len(),
            id
        );
        file.parts.insert(part, data.to_vec());
        Ok(())
    }

    /// PIN record bytes for GET DATA: max/left attempt counters
    pub fn pin_info(&self, pin: u8) -> Option<[u8; 4]> {
        let rec = self.pins.get(&pin)?;
        Some([
            rec.attempts_max,
            rec.attempts_left,
            rec.unblock_max,
            rec.unblock_left,
        ])
    }

    /// Initialize a PIN record (PUT DATA P2 = pin number)
    pub fn initialize_pin(&mut self, pin: u8) -> Result<(), u16> {
        info!("initializing PIN {}", pin);
        self.pins.insert(pin, PinRecord::default());
        Ok(())
    }

    /// File listing for GET DATA 0xA1..0xA6
    ///
    /// 0xA1 answers every file id, 0xA2 the key files; the remaining
    /// selectors exist in the interface but have no content here.
    pub fn list_files(&self, selector: u8) -> Option<Vec<u8>> {
        let ids: Vec<u16> = match selector {
            0xA1 => self.files.keys().copied().collect(),
            0xA2 => self
                .files
                .values()
                .filter(|f| {
                    matches!(
                        f.file_type,
                        file_type::RSA
                            | file_type::EC_NIST
                            | file_type::EC_SECP256K1
                            | file_type::DES
                            | file_type::AES
                    )
                })
                .map(|f| f.id)
                .collect(),
            0xA3..=0xA6 => Vec::new(),
            _ => return None,
        };
        let mut out = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            out.extend_from_slice(&id.to_be_bytes());
        }
        Some(out)
    }

    /// Erase the card: drop all files and PINs, record the supplied ACL
    /// bytes, return to the creation lifecycle
    pub fn erase(&mut self, acl: &[u8; 6]) {
        info!("erasing card");
        self.files.clear();
        self.pins.clear();
        self.selected = None;
        self.acl = *acl;
        self.lifecycle = Lifecycle::Creation;
    }

    /// ACL bytes recorded at applet initialization (MF + application DF)
    pub fn initialization_acl(&self) -> [u8; 6] {
        self.acl
    }

    /// Advance the lifecycle to operational
    pub fn set_lifecycle_operational(&mut self) {
        info!("applet activated");
        self.lifecycle = Lifecycle::Operational;
    }

    /// Current lifecycle phase
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }
}
