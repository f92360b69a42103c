//! APDU response handling
//!
//! A `Response` carries the data bytes plus SW1/SW2 status words the card
//! puts on the wire for one command.

use super::status::SW;

/// A card response
///
/// # Example
/// ```ignore
/// let response = Response::data_ready(vec![0x01, 0x02]);
/// assert_eq!(response.sw(), 0x6102);
///
/// let error = Response::error(SW::CONDITIONS_NOT_SATISFIED);
/// assert!(!error.is_okay());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Create a new response with data and status word
    pub fn new(data: Vec<u8>, sw: u16) -> Self {
        Self {
            data,
            sw1: (sw >> 8) as u8,
            sw2: sw as u8,
        }
    }

    /// Create an empty success response (0x9000)
    pub fn ok() -> Self {
        Self::new(Vec::new(), SW::SUCCESS)
    }

    /// Create an error response (no data)
    pub fn error(sw: u16) -> Self {
        Self::new(Vec::new(), sw)
    }

    /// Create a "data ready" response (0x61xx)
    ///
    /// SW2 carries the staged length; a 256-byte payload encodes as 0x00.
    pub fn data_ready(data: Vec<u8>) -> Self {
        let len = data.len() as u8;
        Self::new(data, SW::data_ready(len))
    }

    /// Check if the response is okay (0x9000 or 0x61xx)
    pub fn is_okay(&self) -> bool {
        (self.sw1 == 0x90 && self.sw2 == 0x00) || self.sw1 == 0x61
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Convert to raw bytes for transmission (data + SW1 + SW2)
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.data.len() + 2);
        result.extend_from_slice(&self.data);
        result.push(self.sw1);
        result.push(self.sw2);
        result
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl From<u16> for Response {
    /// Create an error response from a status word
    fn from(sw: u16) -> Self {
        Self::error(sw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = Response::ok();
        assert!(resp.is_okay());
        assert!(resp.data.is_empty());
        assert_eq!(resp.to_bytes(), vec![0x90, 0x00]);
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(SW::CONDITIONS_NOT_SATISFIED);
        assert!(!resp.is_okay());
        assert_eq!(resp.sw(), 0x6985);
        assert_eq!(resp.to_bytes(), vec![0x69, 0x85]);
    }

    #[test]
    fn test_data_ready() {
        let resp = Response::data_ready(vec![0xDE, 0xAD]);
        assert!(resp.is_okay());
        assert_eq!(resp.sw(), 0x6102);
        assert_eq!(resp.to_bytes(), vec![0xDE, 0xAD, 0x61, 0x02]);
    }

    #[test]
    fn test_data_ready_256_reports_zero() {
        let resp = Response::data_ready(vec![0x55; 256]);
        assert_eq!(resp.sw(), 0x6100);
        assert_eq!(resp.data.len(), 256);
    }

    #[test]
    fn test_from_sw() {
        let resp: Response = 0x6A82.into();
        assert_eq!(resp.sw(), SW::FILE_NOT_FOUND);
        assert!(!resp.is_okay());
    }
}
