//! Symmetric kernels
//!
//! Single-block DES / triple-DES / AES in ECB, which is all the card's
//! encipher/decipher surface needs. Key-length dispatch follows the key
//! file content: DES keys may be 7 bytes (expanded with parity), 8, 16
//! (two-key EDE) or 24 bytes; AES keys 16, 24 or 32 bytes.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use des::{Des, TdesEde3};

use super::CryptoError;

/// DES block size in bytes
pub const DES_BLOCK: usize = 8;
/// AES block size in bytes
pub const AES_BLOCK: usize = 16;

/// Expand a 56-bit DES key to 64 bits
///
/// Each output byte carries seven key bits in its high bits and an odd
/// parity bit in bit 0.
pub fn expand_des_key_56(key: &[u8; 7]) -> [u8; 8] {
    let mut bits = 0u64;
    for &b in key {
        bits = (bits << 8) | b as u64;
    }
    let mut out = [0u8; 8];
    for (i, slot) in out.iter_mut().enumerate() {
        let byte = (((bits >> (49 - 7 * i)) & 0x7F) as u8) << 1;
        let parity = (byte.count_ones() % 2 == 0) as u8;
        *slot = byte | parity;
    }
    out
}

/// Run one DES / triple-DES block
///
/// Accepted key lengths: 7 (expanded to 8), 8, 16 (two-key EDE with
/// K3 = K1) and 24 bytes.
pub fn des_cipher_block(key: &[u8], block: &[u8], decrypt: bool) -> Result<Vec<u8>, CryptoError> {
    if block.len() != DES_BLOCK {
        return Err(CryptoError::InvalidData(format!(
            "DES block must be {} bytes, got {}",
            DES_BLOCK,
            block.len()
        )));
    }

    let key = match key.len() {
        7 => {
            let mut seven = [0u8; 7];
            seven.copy_from_slice(key);
            expand_des_key_56(&seven).to_vec()
        }
        8 => key.to_vec(),
        16 => {
            let mut ede = key.to_vec();
            ede.extend_from_slice(&key[..8]);
            ede
        }
        24 => key.to_vec(),
        n => {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported DES key length {}",
                n
            )))
        }
    };

    let mut b = GenericArray::clone_from_slice(block);
    match key.len() {
        8 => {
            let cipher = Des::new(GenericArray::from_slice(&key));
            if decrypt {
                cipher.decrypt_block(&mut b);
            } else {
                cipher.encrypt_block(&mut b);
            }
        }
        _ => {
            let cipher = TdesEde3::new(GenericArray::from_slice(&key));
            if decrypt {
                cipher.decrypt_block(&mut b);
            } else {
                cipher.encrypt_block(&mut b);
            }
        }
    }
    Ok(b.to_vec())
}

/// Run one AES block with a 128/192/256-bit key
pub fn aes_cipher_block(key: &[u8], block: &[u8], decrypt: bool) -> Result<Vec<u8>, CryptoError> {
    if block.len() != AES_BLOCK {
        return Err(CryptoError::InvalidData(format!(
            "AES block must be {} bytes, got {}",
            AES_BLOCK,
            block.len()
        )));
    }

    let mut b = GenericArray::clone_from_slice(block);
    match key.len() {
        16 => {
            let cipher = Aes128::new(GenericArray::from_slice(key));
            if decrypt {
                cipher.decrypt_block(&mut b);
            } else {
                cipher.encrypt_block(&mut b);
            }
        }
        24 => {
            let cipher = Aes192::new(GenericArray::from_slice(key));
            if decrypt {
                cipher.decrypt_block(&mut b);
            } else {
                cipher.encrypt_block(&mut b);
            }
        }
        32 => {
            let cipher = Aes256::new(GenericArray::from_slice(key));
            if decrypt {
                cipher.decrypt_block(&mut b);
            } else {
                cipher.encrypt_block(&mut b);
            }
        }
        n => {
            return Err(CryptoError::InvalidKey(format!(
                "unsupported AES key length {}",
                n
            )))
        }
    }
    Ok(b.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_des_key_parity() {
        let expanded = expand_des_key_56(&[0u8; 7]);
        // all key bits zero: every byte is just the odd-parity bit
        assert_eq!(expanded, [0x01; 8]);

        let expanded = expand_des_key_56(&[0xFF; 7]);
        // seven ones per byte, parity already odd
        assert_eq!(expanded, [0xFE; 8]);

        let expanded = expand_des_key_56(&[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD]);
        for byte in expanded {
            assert_eq!(byte.count_ones() % 2, 1, "byte {:02X} parity", byte);
        }
    }

    #[test]
    fn test_expand_preserves_key_bits() {
        let key = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE];
        let expanded = expand_des_key_56(&key);
        let mut bits = 0u64;
        for b in expanded {
            bits = (bits << 7) | ((b >> 1) as u64);
        }
        let mut orig = 0u64;
        for b in key {
            orig = (orig << 8) | b as u64;
        }
        assert_eq!(bits, orig);
    }

    #[test]
    fn test_des_round_trip() {
        let key = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF];
        let plain = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77];
        let cipher = des_cipher_block(&key, &plain, false).unwrap();
        assert_ne!(cipher, plain);
        let back = des_cipher_block(&key, &cipher, true).unwrap();
        assert_eq!(back, plain);
    }

    #[test]
    fn test_seven_byte_key_matches_expanded_key() {
        let key7 = [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD];
        let key8 = expand_des_key_56(&key7);
        let plain = [0xA5; 8];
        assert_eq!(
            des_cipher_block(&key7, &plain, false).unwrap(),
            des_cipher_block(&key8, &plain, false).unwrap()
        );
    }

    #[test]
    fn test_two_key_3des_equals_k1_k2_k1() {
        let k1 = [0x11; 8];
        let k2 = [0x22; 8];
        let mut key16 = Vec::new();
        key16.extend_from_slice(&k1);
        key16.extend_from_slice(&k2);
        let mut key24 = key16.clone();
        key24.extend_from_slice(&k1);

        let plain = [0x3C; 8];
        assert_eq!(
            des_cipher_block(&key16, &plain, false).unwrap(),
            des_cipher_block(&key24, &plain, false).unwrap()
        );
    }

    #[test]
    fn test_des_rejects_bad_lengths() {
        assert!(des_cipher_block(&[0u8; 9], &[0u8; 8], false).is_err());
        assert!(des_cipher_block(&[0u8; 8], &[0u8; 7], false).is_err());
    }

    #[test]
    fn test_aes_round_trip_all_key_sizes() {
        let plain = [0x42; 16];
        for key_len in [16usize, 24, 32] {
            let key = vec![0x7E; key_len];
            let cipher = aes_cipher_block(&key, &plain, false).unwrap();
            assert_ne!(cipher.as_slice(), plain.as_slice());
            let back = aes_cipher_block(&key, &cipher, true).unwrap();
            assert_eq!(back, plain);
        }
    }

    #[test]
    fn test_aes_rejects_bad_lengths() {
        assert!(aes_cipher_block(&[0u8; 20], &[0u8; 16], false).is_err());
        assert!(aes_cipher_block(&[0u8; 16], &[0u8; 15], false).is_err());
    }
}
