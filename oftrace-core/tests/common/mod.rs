//! Capture-building helpers shared by integration tests.

#![allow(dead_code)]

use std::io::Write;

use tempfile::{Builder, NamedTempFile};

pub const SWITCH: [u8; 4] = [10, 0, 0, 2];
pub const CONTROLLER: [u8; 4] = [10, 0, 0, 1];
pub const SWITCH_PORT: u16 = 45000;
pub const OFP_PORT: u16 = 6633;

pub const FIN: u8 = 0x11;
pub const RST: u8 = 0x04;
pub const PSH_ACK: u8 = 0x18;

/// OpenFlow 1.0 message of `len` bytes, body filled with a marker byte.
pub fn ofp(msg_type: u8, len: u16, xid: u32) -> Vec<u8> {
    let mut msg = vec![0x01, msg_type];
    msg.extend_from_slice(&len.to_be_bytes());
    msg.extend_from_slice(&xid.to_be_bytes());
    msg.resize(len as usize, 0xa5);
    msg
}

/// Ethernet/IPv4/TCP frame.
pub fn tcp_frame(
    src: ([u8; 4], u16),
    dst: ([u8; 4], u16),
    seq: u32,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::with_capacity(54 + payload.len());

    frame.extend_from_slice(&[0x00, 0x66, 0x77, 0x88, 0x99, 0xaa]); // Dst MAC
    frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]); // Src MAC
    frame.extend_from_slice(&[0x08, 0x00]); // IPv4

    let total_len = (20 + 20 + payload.len()) as u16;
    frame.push(0x45);
    frame.push(0x00);
    frame.extend_from_slice(&total_len.to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x40, 0x00]); // Id, DF
    frame.push(64);
    frame.push(6);
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&dst.0);

    frame.extend_from_slice(&src.1.to_be_bytes());
    frame.extend_from_slice(&dst.1.to_be_bytes());
    frame.extend_from_slice(&seq.to_be_bytes());
    frame.extend_from_slice(&0u32.to_be_bytes());
    frame.push(0x50);
    frame.push(flags);
    frame.extend_from_slice(&[0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);

    frame.extend_from_slice(payload);
    frame
}

/// Switch-to-controller data frame.
pub fn upstream(seq: u32, payload: &[u8]) -> Vec<u8> {
    tcp_frame(
        (SWITCH, SWITCH_PORT),
        (CONTROLLER, OFP_PORT),
        seq,
        PSH_ACK,
        payload,
    )
}

/// Controller-to-switch data frame.
pub fn downstream(seq: u32, payload: &[u8]) -> Vec<u8> {
    tcp_frame(
        (CONTROLLER, OFP_PORT),
        (SWITCH, SWITCH_PORT),
        seq,
        PSH_ACK,
        payload,
    )
}

/// Builds a little-endian microsecond pcap in memory.
pub struct PcapWriter {
    data: Vec<u8>,
    ts_us: u64,
}

impl PcapWriter {
    pub fn new() -> Self {
        Self::with_snaplen(65535)
    }

    pub fn with_snaplen(snaplen: u32) -> Self {
        let mut data = Vec::new();
        data.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&snaplen.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes()); // Ethernet
        Self {
            data,
            ts_us: 1_600_000_000_000_000,
        }
    }

    /// Append a frame 1ms after the previous one.
    pub fn frame(mut self, frame: &[u8]) -> Self {
        self.record(frame, frame.len());
        self
    }

    /// Append a frame cut to `caplen` bytes.
    pub fn truncated_frame(mut self, frame: &[u8], caplen: usize) -> Self {
        self.record(&frame[..caplen], frame.len());
        self
    }

    fn record(&mut self, captured: &[u8], orig_len: usize) {
        self.ts_us += 1000;
        let sec = (self.ts_us / 1_000_000) as u32;
        let usec = (self.ts_us % 1_000_000) as u32;
        self.data.extend_from_slice(&sec.to_le_bytes());
        self.data.extend_from_slice(&usec.to_le_bytes());
        self.data.extend_from_slice(&(captured.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&(orig_len as u32).to_le_bytes());
        self.data.extend_from_slice(captured);
    }

    pub fn bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn write(self) -> NamedTempFile {
        let mut file = Builder::new().suffix(".pcap").tempfile().unwrap();
        file.write_all(&self.data).unwrap();
        file.flush().unwrap();
        file
    }
}
