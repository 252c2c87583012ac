//! Packet source abstractions and implementations.
//!
//! A [`PacketSource`] hands out sequential [`PacketReader`]s. File sources
//! can do so repeatedly, which is what makes a trace rewindable; stream
//! sources (pipes, stdin) hand out exactly one.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{Error, PcapError};
use crate::io::Compression;
use crate::pcap::PcapReader;

/// Metadata about a packet source.
#[derive(Clone, Debug)]
pub struct PacketSourceMetadata {
    /// Link-layer type (e.g., 1 = Ethernet)
    pub link_type: u32,
    /// Snapshot length
    pub snaplen: u32,
    /// Total size in bytes (if known)
    pub size_bytes: Option<u64>,
    /// Compression the source is stored with
    pub compression: Compression,
    /// Whether the source can be read again from the start
    pub seekable: bool,
}

/// Raw packet data from a reader.
#[derive(Clone, Debug)]
pub struct RawPacket {
    /// Frame number (1-indexed, matching Wireshark)
    pub frame_number: u64,
    /// Timestamp in microseconds since Unix epoch
    pub timestamp_us: i64,
    /// Captured length (may be less than original)
    pub captured_len: u32,
    /// Original packet length on the wire
    pub original_len: u32,
    /// Link-layer type of this packet
    pub link_type: u16,
    /// Packet data
    pub data: Bytes,
}

/// Source of packet data.
///
/// The associated `Reader` keeps dispatch static in the per-frame loop.
pub trait PacketSource {
    /// The reader type this source produces
    type Reader: PacketReader;

    fn metadata(&self) -> &PacketSourceMetadata;

    /// Create a reader positioned at the first packet.
    fn reader(&mut self) -> Result<Self::Reader, Error>;

    fn link_type(&self) -> u32 {
        self.metadata().link_type
    }
}

/// Sequential reader of packets from a source.
pub trait PacketReader {
    /// Read the next packet. Returns `Ok(None)` at end of input.
    fn next_packet(&mut self) -> Result<Option<RawPacket>, Error>;

    /// Frames read so far.
    fn frame_count(&self) -> u64;

    /// Capture bytes parsed so far, after decompression.
    fn bytes_consumed(&self) -> u64;

    fn link_type(&self) -> u32;
}

impl<R: Read> PacketReader for PcapReader<R> {
    #[inline]
    fn next_packet(&mut self) -> Result<Option<RawPacket>, Error> {
        PcapReader::next_packet(self)
    }

    fn frame_count(&self) -> u64 {
        PcapReader::frame_count(self)
    }

    fn bytes_consumed(&self) -> u64 {
        PcapReader::bytes_consumed(self)
    }

    fn link_type(&self) -> u32 {
        PcapReader::link_type(self) as u32
    }
}

/// Packet source backed by a PCAP/PCAPNG file.
pub struct FilePacketSource {
    path: PathBuf,
    metadata: PacketSourceMetadata,
    /// Reader opened while probing, handed out by the first `reader()`.
    probed: Option<PcapReader<File>>,
}

impl FilePacketSource {
    /// Open a capture file as a packet source.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        let reader = PcapReader::open(&path)?;
        let size_bytes = std::fs::metadata(&path).ok().map(|m| m.len());

        let metadata = PacketSourceMetadata {
            link_type: reader.link_type() as u32,
            snaplen: reader.snaplen(),
            size_bytes,
            compression: reader.compression(),
            seekable: true,
        };

        Ok(Self {
            path,
            metadata,
            probed: Some(reader),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }
}

impl PacketSource for FilePacketSource {
    type Reader = PcapReader<File>;

    fn metadata(&self) -> &PacketSourceMetadata {
        &self.metadata
    }

    fn reader(&mut self) -> Result<Self::Reader, Error> {
        match self.probed.take() {
            Some(reader) => Ok(reader),
            None => PcapReader::open(&self.path),
        }
    }
}

/// Packet source over a one-shot byte stream such as a pipe or stdin.
pub struct StreamPacketSource<R: Read> {
    metadata: PacketSourceMetadata,
    reader: Option<PcapReader<R>>,
}

impl<R: Read> StreamPacketSource<R> {
    /// Wrap a byte stream; the capture header is read immediately.
    pub fn new(source: R) -> Result<Self, Error> {
        let reader = PcapReader::from_reader(source)?;
        let metadata = PacketSourceMetadata {
            link_type: reader.link_type() as u32,
            snaplen: reader.snaplen(),
            size_bytes: None,
            compression: reader.compression(),
            seekable: false,
        };
        Ok(Self {
            metadata,
            reader: Some(reader),
        })
    }
}

impl<R: Read> PacketSource for StreamPacketSource<R> {
    type Reader = PcapReader<R>;

    fn metadata(&self) -> &PacketSourceMetadata {
        &self.metadata
    }

    fn reader(&mut self) -> Result<Self::Reader, Error> {
        self.reader
            .take()
            .ok_or(Error::Pcap(PcapError::RewindUnsupported))
    }
}
