//! BER-TLV encoder
//!
//! Builds the TLV response templates the card answers with (public-key
//! templates, curve parameters). Emits the same restricted length forms the
//! parser accepts: one byte up to 127, `0x81 LL` up to 255.

/// Encode a length field
///
/// Lengths above 255 do not occur in this command surface; the card never
/// stages more than 256 bytes and templates stay well below that.
pub fn encode_length(length: usize) -> Vec<u8> {
    debug_assert!(length <= 255);
    if length < 128 {
        vec![length as u8]
    } else {
        vec![0x81, length as u8]
    }
}

/// Builder for response TLV structures
///
/// # Example
/// ```ignore
/// let point = TlvBuilder::new().tag(0x86, &public_point).build();
/// ```
#[derive(Debug, Default)]
pub struct TlvBuilder {
    data: Vec<u8>,
}

impl TlvBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Append a tag-length-value triple
    pub fn tag(mut self, tag: u8, value: &[u8]) -> Self {
        self.data.push(tag);
        self.data.extend(encode_length(value.len()));
        self.data.extend_from_slice(value);
        self
    }

    /// Append raw pre-encoded bytes
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Wrap the current content in an outer tag
    pub fn wrap(self, tag: u8) -> Self {
        let mut wrapped = vec![tag];
        wrapped.extend(encode_length(self.data.len()));
        wrapped.extend(self.data);
        Self { data: wrapped }
    }

    /// Build the final byte vector
    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tlv::parse_exact;

    #[test]
    fn test_encode_short_length() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(127), vec![0x7F]);
    }

    #[test]
    fn test_encode_long_length() {
        assert_eq!(encode_length(128), vec![0x81, 0x80]);
        assert_eq!(encode_length(255), vec![0x81, 0xFF]);
    }

    #[test]
    fn test_simple_tag() {
        let data = TlvBuilder::new().tag(0x86, &[0x04, 0x01, 0x02]).build();
        assert_eq!(data, vec![0x86, 0x03, 0x04, 0x01, 0x02]);
    }

    #[test]
    fn test_wrap_round_trips_through_parser() {
        let data = TlvBuilder::new()
            .tag(0x80, &[])
            .tag(0x85, &[0x04; 65])
            .wrap(0x7C)
            .build();
        let outer = parse_exact(&data).unwrap();
        assert_eq!(outer.tag, 0x7C);
        assert_eq!(outer.value.len(), 2 + 2 + 65);
    }

    #[test]
    fn test_long_value_uses_0x81_form() {
        let data = TlvBuilder::new().tag(0x86, &[0xAB; 133]).build();
        assert_eq!(&data[..3], &[0x86, 0x81, 0x85]);
        let tlv = parse_exact(&data).unwrap();
        assert_eq!(tlv.value.len(), 133);
    }
}
