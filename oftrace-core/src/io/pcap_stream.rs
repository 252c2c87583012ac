//! Generic PCAP/PCAPNG reader over any Read source.
//!
//! Parsing is delegated to `pcap_parser`; this layer tracks frame numbers,
//! link type and how far into the source it has got, and tells a capture
//! that stops mid-record apart from one that ends cleanly.

use std::io::Read;

use bytes::Bytes;
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapError as PcapParserError, PcapNGReader};

use crate::error::{Error, PcapError};
use crate::io::RawPacket;

/// Buffer size for pcap_parser readers (256KB).
const BUFFER_SIZE: usize = 262144;

/// Snaplen assumed until a header says otherwise.
const DEFAULT_SNAPLEN: u32 = 65535;

/// Format of the capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcapFormat {
    /// Classic PCAP (little-endian, microseconds)
    LegacyLeMicro,
    /// Classic PCAP (big-endian, microseconds)
    LegacyBeMicro,
    /// Classic PCAP (little-endian, nanoseconds)
    LegacyLeNano,
    /// Classic PCAP (big-endian, nanoseconds)
    LegacyBeNano,
    /// PCAPNG format
    PcapNg,
}

impl PcapFormat {
    /// Detect the format from the first four bytes of the capture.
    pub fn detect(data: &[u8]) -> Result<Self, Error> {
        let Some(magic) = data.get(..4) else {
            return Err(Error::Pcap(PcapError::InvalidFormat {
                reason: "Data too small for PCAP magic".into(),
            }));
        };
        let magic = u32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]);

        match magic {
            0xa1b2c3d4 => Ok(PcapFormat::LegacyLeMicro),
            0xd4c3b2a1 => Ok(PcapFormat::LegacyBeMicro),
            0xa1b23c4d => Ok(PcapFormat::LegacyLeNano),
            0x4d3cb2a1 => Ok(PcapFormat::LegacyBeNano),
            0x0a0d0d0a => Ok(PcapFormat::PcapNg),
            _ => Err(Error::Pcap(PcapError::InvalidFormat {
                reason: format!("Unknown PCAP magic: 0x{:08x}", magic),
            })),
        }
    }

    pub fn is_pcapng(&self) -> bool {
        matches!(self, PcapFormat::PcapNg)
    }

    pub fn is_nanosecond(&self) -> bool {
        matches!(self, PcapFormat::LegacyLeNano | PcapFormat::LegacyBeNano)
    }
}

/// Reader bookkeeping shared by both container formats.
#[derive(Debug)]
struct ReaderState {
    frame_number: u64,
    link_type: u32,
    snaplen: u32,
    nanosecond: bool,
    bytes_consumed: u64,
}

/// Generic PCAP/PCAPNG reader over any Read source.
pub struct GenericPcapReader<R: Read> {
    inner: ReaderInner<R>,
    state: ReaderState,
}

/// Enum dispatch over the two container formats.
enum ReaderInner<R: Read> {
    Legacy(LegacyPcapReader<R>),
    Ng(PcapNGReader<R>),
}

impl<R: Read> GenericPcapReader<R> {
    /// Create a reader for a source whose format is already known.
    ///
    /// Header blocks ahead of the first packet are read before returning so
    /// link type and snaplen are available immediately.
    pub fn with_format(source: R, format: PcapFormat) -> Result<Self, Error> {
        let inner = if format.is_pcapng() {
            let reader = PcapNGReader::new(BUFFER_SIZE, source).map_err(|e| {
                Error::Pcap(PcapError::InvalidFormat {
                    reason: format!("Failed to parse PCAPNG: {}", e),
                })
            })?;
            ReaderInner::Ng(reader)
        } else {
            let reader = LegacyPcapReader::new(BUFFER_SIZE, source).map_err(|e| {
                Error::Pcap(PcapError::InvalidFormat {
                    reason: format!("Failed to parse legacy PCAP: {}", e),
                })
            })?;
            ReaderInner::Legacy(reader)
        };

        let mut reader = GenericPcapReader {
            inner,
            state: ReaderState {
                frame_number: 0,
                link_type: 1, // Ethernet until a header says otherwise
                snaplen: DEFAULT_SNAPLEN,
                nanosecond: format.is_nanosecond(),
                bytes_consumed: 0,
            },
        };
        reader.advance(true)?;
        Ok(reader)
    }

    /// Read the next packet. Returns `Ok(None)` at a clean end of input.
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, Error> {
        self.advance(false)
    }

    fn advance(&mut self, preamble: bool) -> Result<Option<RawPacket>, Error> {
        match &mut self.inner {
            ReaderInner::Legacy(reader) => next_block(reader, &mut self.state, preamble),
            ReaderInner::Ng(reader) => next_block(reader, &mut self.state, preamble),
        }
    }

    /// Link type of the capture (e.g., 1 = Ethernet).
    pub fn link_type(&self) -> u32 {
        self.state.link_type
    }

    pub fn snaplen(&self) -> u32 {
        self.state.snaplen
    }

    /// Frames returned so far.
    pub fn frame_count(&self) -> u64 {
        self.state.frame_number
    }

    /// Bytes of (decompressed) capture parsed so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.state.bytes_consumed
    }
}

/// Walk blocks until a packet is found or input ends.
///
/// With `preamble` set, stops in front of the first packet without
/// consuming it, having absorbed any header blocks on the way.
fn next_block<P: PcapReaderIterator>(
    reader: &mut P,
    state: &mut ReaderState,
    preamble: bool,
) -> Result<Option<RawPacket>, Error> {
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let packet = match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        state.link_type = header.network.0 as u32;
                        state.snaplen = header.snaplen;
                        state.nanosecond = header.is_nanosecond_precision();
                        None
                    }
                    PcapBlockOwned::Legacy(_) if preamble => return Ok(None),
                    PcapBlockOwned::Legacy(packet) => {
                        let fraction = if state.nanosecond {
                            packet.ts_usec / 1000
                        } else {
                            packet.ts_usec
                        };
                        Some(RawPacket {
                            frame_number: state.frame_number + 1,
                            timestamp_us: (packet.ts_sec as i64) * 1_000_000 + fraction as i64,
                            captured_len: packet.caplen,
                            original_len: packet.origlen,
                            link_type: state.link_type as u16,
                            data: Bytes::copy_from_slice(packet.data),
                        })
                    }
                    PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                        state.link_type = idb.linktype.0 as u32;
                        state.snaplen = idb.snaplen;
                        None
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(_) | Block::SimplePacket(_))
                        if preamble =>
                    {
                        return Ok(None)
                    }
                    PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                        let caplen = (epb.caplen as usize).min(epb.data.len());
                        Some(RawPacket {
                            frame_number: state.frame_number + 1,
                            timestamp_us: ((epb.ts_high as i64) << 32) | (epb.ts_low as i64),
                            captured_len: caplen as u32,
                            original_len: epb.origlen,
                            link_type: state.link_type as u16,
                            data: Bytes::copy_from_slice(&epb.data[..caplen]),
                        })
                    }
                    PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                        let caplen = (spb.origlen as usize).min(spb.data.len());
                        Some(RawPacket {
                            frame_number: state.frame_number + 1,
                            timestamp_us: 0,
                            captured_len: caplen as u32,
                            original_len: spb.origlen,
                            link_type: state.link_type as u16,
                            data: Bytes::copy_from_slice(&spb.data[..caplen]),
                        })
                    }
                    _ => None,
                };

                reader.consume(offset);
                state.bytes_consumed += offset as u64;
                if let Some(packet) = packet {
                    state.frame_number = packet.frame_number;
                    return Ok(Some(packet));
                }
            }
            Err(PcapParserError::Eof) => return Ok(None),
            Err(PcapParserError::UnexpectedEof) => {
                return Err(Error::Pcap(PcapError::TruncatedCapture {
                    frame: state.frame_number,
                    reason: "capture ends inside a record".into(),
                }));
            }
            Err(PcapParserError::Incomplete(_)) => {
                reader.refill().map_err(|e| {
                    Error::Pcap(PcapError::InvalidFormat {
                        reason: format!("PCAP refill error: {}", e),
                    })
                })?;
            }
            Err(e) => {
                return Err(Error::Pcap(PcapError::InvalidFormat {
                    reason: format!("PCAP parse error: {}", e),
                }));
            }
        }
    }
}
