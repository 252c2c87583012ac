//! OpenFlow 1.0 header definitions.

use thiserror::Error;

/// Fixed OpenFlow header size.
pub const OFP_HEADER_LEN: usize = 8;

/// Wire version of OpenFlow 1.0.
pub const OFP_VERSION: u8 = 0x01;

/// Default controller TCP port.
pub const OFP_TCP_PORT: u16 = 6633;

/// Default upper bound on a framed message's declared length.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 8192;

/// OpenFlow 1.0 message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OfpType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Vendor = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    PortMod = 15,
    StatsRequest = 16,
    StatsReply = 17,
    BarrierRequest = 18,
    BarrierReply = 19,
    QueueGetConfigRequest = 20,
    QueueGetConfigReply = 21,
}

impl OfpType {
    pub const MAX: u8 = OfpType::QueueGetConfigReply as u8;

    pub fn from_u8(value: u8) -> Option<Self> {
        use OfpType::*;
        Some(match value {
            0 => Hello,
            1 => Error,
            2 => EchoRequest,
            3 => EchoReply,
            4 => Vendor,
            5 => FeaturesRequest,
            6 => FeaturesReply,
            7 => GetConfigRequest,
            8 => GetConfigReply,
            9 => SetConfig,
            10 => PacketIn,
            11 => FlowRemoved,
            12 => PortStatus,
            13 => PacketOut,
            14 => FlowMod,
            15 => PortMod,
            16 => StatsRequest,
            17 => StatsReply,
            18 => BarrierRequest,
            19 => BarrierReply,
            20 => QueueGetConfigRequest,
            21 => QueueGetConfigReply,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            OfpType::Hello => "HELLO",
            OfpType::Error => "ERROR",
            OfpType::EchoRequest => "ECHO_REQUEST",
            OfpType::EchoReply => "ECHO_REPLY",
            OfpType::Vendor => "VENDOR",
            OfpType::FeaturesRequest => "FEATURES_REQUEST",
            OfpType::FeaturesReply => "FEATURES_REPLY",
            OfpType::GetConfigRequest => "GET_CONFIG_REQUEST",
            OfpType::GetConfigReply => "GET_CONFIG_REPLY",
            OfpType::SetConfig => "SET_CONFIG",
            OfpType::PacketIn => "PACKET_IN",
            OfpType::FlowRemoved => "FLOW_REMOVED",
            OfpType::PortStatus => "PORT_STATUS",
            OfpType::PacketOut => "PACKET_OUT",
            OfpType::FlowMod => "FLOW_MOD",
            OfpType::PortMod => "PORT_MOD",
            OfpType::StatsRequest => "STATS_REQUEST",
            OfpType::StatsReply => "STATS_REPLY",
            OfpType::BarrierRequest => "BARRIER_REQUEST",
            OfpType::BarrierReply => "BARRIER_REPLY",
            OfpType::QueueGetConfigRequest => "QUEUE_GET_CONFIG_REQUEST",
            OfpType::QueueGetConfigReply => "QUEUE_GET_CONFIG_REPLY",
        }
    }
}

/// Raw OpenFlow header fields, before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    pub version: u8,
    pub msg_type: u8,
    /// Total message length including this header.
    pub length: u16,
    pub xid: u32,
}

impl OfpHeader {
    /// Read a header from the first eight bytes of `buf`.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < OFP_HEADER_LEN {
            return None;
        }
        Some(Self {
            version: buf[0],
            msg_type: buf[1],
            length: u16::from_be_bytes([buf[2], buf[3]]),
            xid: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        })
    }

    pub fn ofp_type(&self) -> Option<OfpType> {
        OfpType::from_u8(self.msg_type)
    }

    /// Display name of the type, or `UNKNOWN`.
    pub fn type_name(&self) -> &'static str {
        self.ofp_type().map_or("UNKNOWN", |t| t.name())
    }

    pub fn encode(&self) -> [u8; OFP_HEADER_LEN] {
        let mut out = [0u8; OFP_HEADER_LEN];
        out[0] = self.version;
        out[1] = self.msg_type;
        out[2..4].copy_from_slice(&self.length.to_be_bytes());
        out[4..8].copy_from_slice(&self.xid.to_be_bytes());
        out
    }
}

/// Why a header cannot start a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("unexpected version {found:#04x} (expected {expected:#04x})")]
    BadVersion { found: u8, expected: u8 },

    #[error("unknown message type {0}")]
    BadType(u8),

    #[error("declared length {length} outside {min}..={max}")]
    BadLength { length: u16, min: usize, max: usize },
}
