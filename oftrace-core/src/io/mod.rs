//! Packet I/O abstractions.
//!
//! - `PacketSource` trait with an associated `Reader` type
//! - `PacketReader` trait for sequential reading
//!
//! ## Available Sources
//!
//! - `FilePacketSource` - Buffered file I/O, rewindable
//! - `StreamPacketSource` - Any `Read` (pipes, stdin), single pass
//!
//! Gzip-compressed captures are decompressed transparently by both.

mod decompress;
mod pcap_stream;
mod source;

pub use decompress::{Compression, DecompressReader};
pub use pcap_stream::{GenericPcapReader, PcapFormat};
pub use source::{
    FilePacketSource, PacketReader, PacketSource, PacketSourceMetadata, RawPacket,
    StreamPacketSource,
};
