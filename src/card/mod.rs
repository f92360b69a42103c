//! Card-side state: the file-backed key store
//!
//! The applet core consumes this module through a narrow interface (file
//! selection, typed key parts, PIN records, lifecycle); everything else
//! about the file system — real ACL evaluation, PKCS#15 structure — is the
//! embedding application's business.

mod files;

pub use files::{file_type, part, CardFs, KeyFile, Lifecycle, PinRecord};
