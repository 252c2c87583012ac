//! Capture file reading.
//!
//! - [`PcapReader`] - Reader with automatic gzip and format detection
//! - [`crate::io::RawPacket`] - Raw packet data (re-exported from the io module)

mod reader;

pub use reader::PcapReader;
