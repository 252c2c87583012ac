//! PCAP file reader with automatic compression handling.
//!
//! [`PcapReader`] wraps [`GenericPcapReader`](crate::io::GenericPcapReader)
//! and takes care of:
//! - File opening
//! - Gzip detection and decompression
//! - PCAP format detection (Legacy in either byte order vs PCAPNG)
//!
//! Detection peeks through buffered readers instead of seeking, so the same
//! path works for pipes and stdin.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::error::{Error, PcapError};
use crate::io::{Compression, DecompressReader, GenericPcapReader, PcapFormat, RawPacket};

/// Byte source as seen by the PCAP parser.
type Decoded<R> = BufReader<DecompressReader<BufReader<R>>>;

/// Reader for PCAP and PCAPNG captures, with optional gzip.
///
/// # Example
///
/// ```ignore
/// use oftrace_core::pcap::PcapReader;
///
/// let mut reader = PcapReader::open("controller.pcap.gz")?;
/// while let Some(packet) = reader.next_packet()? {
///     println!("Frame {}: {} bytes", packet.frame_number, packet.data.len());
/// }
/// ```
pub struct PcapReader<R: Read> {
    inner: GenericPcapReader<Decoded<R>>,
    compression: Compression,
    format: PcapFormat,
}

impl PcapReader<File> {
    /// Open a capture file for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Pcap(PcapError::FileNotFound {
                path: path.display().to_string(),
            }),
            _ => Error::Io(e),
        })?;
        Self::from_reader(file)
    }
}

impl<R: Read> PcapReader<R> {
    /// Wrap an arbitrary byte source, detecting compression and format.
    pub fn from_reader(source: R) -> Result<Self, Error> {
        let mut raw = BufReader::new(source);
        let compression = Compression::detect(raw.fill_buf()?);

        let mut decoded = BufReader::new(DecompressReader::new(raw, compression));
        let head = decoded.fill_buf().map_err(|e| {
            Error::Pcap(PcapError::InvalidFormat {
                reason: format!("Failed to read capture header: {}", e),
            })
        })?;
        let format = PcapFormat::detect(head)?;

        let inner = GenericPcapReader::with_format(decoded, format)?;
        Ok(Self {
            inner,
            compression,
            format,
        })
    }

    /// Link type of the capture (e.g., 1 = Ethernet).
    #[inline]
    pub fn link_type(&self) -> u16 {
        self.inner.link_type() as u16
    }

    pub fn snaplen(&self) -> u32 {
        self.inner.snaplen()
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn format(&self) -> PcapFormat {
        self.format
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.inner.frame_count()
    }

    /// Decompressed bytes parsed so far.
    #[inline]
    pub fn bytes_consumed(&self) -> u64 {
        self.inner.bytes_consumed()
    }

    /// Read the next packet. Returns `Ok(None)` at end of input.
    #[inline]
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, Error> {
        self.inner.next_packet()
    }
}

impl<R: Read> Iterator for PcapReader<R> {
    type Item = Result<RawPacket, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}
