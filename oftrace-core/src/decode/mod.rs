//! Frame decoding: from a captured frame to a TCP segment of interest.
//!
//! Only IPv4/TCP is extracted. Everything else (ARP, IPv6, UDP, IP
//! fragments, frames too short to hold the headers) is skipped silently.

#[cfg(test)]
pub(crate) mod test_utils;

use std::net::Ipv4Addr;

use bytes::Bytes;
use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice, TcpHeaderSlice};
use tracing::trace;

use crate::io::RawPacket;
use crate::openflow::OFP_TCP_PORT;
use crate::stream::FlowKey;

/// Link-layer types understood by the decoder.
pub mod linktype {
    pub const ETHERNET: u16 = 1;
    pub const RAW: u16 = 101;
    pub const LINUX_SLL: u16 = 113;
}

mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const VLAN: u16 = 0x8100;
    pub const QINQ: u16 = 0x88a8;
}

const IP_PROTO_TCP: u8 = 6;

/// Linux cooked capture header length; protocol sits in the last two bytes.
const SLL_HEADER_LEN: usize = 16;

/// Selects the controller side of the traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointFilter {
    /// Controller address; `None` accepts any address.
    pub addr: Option<Ipv4Addr>,
    /// Controller port; `None` accepts any port.
    pub port: Option<u16>,
}

impl Default for EndpointFilter {
    fn default() -> Self {
        Self {
            addr: None,
            port: Some(OFP_TCP_PORT),
        }
    }
}

impl EndpointFilter {
    /// Accept every TCP flow.
    pub fn any() -> Self {
        Self {
            addr: None,
            port: None,
        }
    }

    pub fn controller(addr: Ipv4Addr, port: u16) -> Self {
        Self {
            addr: Some(addr),
            port: Some(port),
        }
    }

    /// True when one end of `flow` is the controller endpoint.
    pub fn matches(&self, flow: &FlowKey) -> bool {
        let src = self.addr.map_or(true, |a| a == flow.src_ip)
            && self.port.map_or(true, |p| p == flow.src_port);
        let dst = self.addr.map_or(true, |a| a == flow.dst_ip)
            && self.port.map_or(true, |p| p == flow.dst_port);
        src || dst
    }
}

/// TCP payload of one frame, ready for a session.
#[derive(Debug, Clone)]
pub struct TcpSegment {
    pub flow: FlowKey,
    pub seq: u32,
    /// Captured payload bytes; may be shorter than `wire_len`.
    pub payload: Bytes,
    /// Payload length on the wire according to the IP header.
    pub wire_len: usize,
    /// FIN or RST was set.
    pub closing: bool,
}

impl TcpSegment {
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.wire_len
    }
}

/// Extracts IPv4/TCP segments from captured frames.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoder {
    filter: EndpointFilter,
}

impl FrameDecoder {
    pub fn new(filter: EndpointFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &EndpointFilter {
        &self.filter
    }

    /// Decode one frame. `None` means the frame is not of interest.
    pub fn decode(&self, packet: &RawPacket) -> Option<TcpSegment> {
        let data = &packet.data[..];
        let ip_offset = match packet.link_type {
            linktype::ETHERNET => ethernet_payload_offset(data)?,
            linktype::LINUX_SLL => sll_payload_offset(data)?,
            linktype::RAW => 0,
            other => {
                trace!(frame = packet.frame_number, link_type = other, "Unsupported link type");
                return None;
            }
        };

        let ipv4 = Ipv4HeaderSlice::from_slice(data.get(ip_offset..)?).ok()?;
        if ipv4.protocol().0 != IP_PROTO_TCP {
            return None;
        }
        if ipv4.more_fragments() || ipv4.fragments_offset().value() != 0 {
            trace!(frame = packet.frame_number, "Skipping IP fragment");
            return None;
        }
        let ip_len = ipv4.slice().len();

        let tcp_offset = ip_offset + ip_len;
        let tcp = TcpHeaderSlice::from_slice(data.get(tcp_offset..)?).ok()?;
        let tcp_len = tcp.slice().len();

        let flow = FlowKey::new(
            ipv4.source_addr(),
            tcp.source_port(),
            ipv4.destination_addr(),
            tcp.destination_port(),
        );
        if !self.filter.matches(&flow) {
            return None;
        }

        let payload_offset = tcp_offset + tcp_len;
        let captured = data.len().saturating_sub(payload_offset);
        // A zero total length comes from segmentation offload; trust the capture.
        let wire_len = match ipv4.total_len() as usize {
            0 => captured,
            total => total.saturating_sub(ip_len + tcp_len),
        };
        let closing = tcp.fin() || tcp.rst();
        if wire_len == 0 && !closing {
            return None;
        }

        // Anything past the IP payload is link-layer padding.
        let kept = captured.min(wire_len);
        Some(TcpSegment {
            flow,
            seq: tcp.sequence_number(),
            payload: packet.data.slice(payload_offset..payload_offset + kept),
            wire_len,
            closing,
        })
    }
}

/// Offset of the IPv4 header in an Ethernet II frame, looking through VLAN tags.
fn ethernet_payload_offset(data: &[u8]) -> Option<usize> {
    let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
    let mut offset = eth.slice().len();
    let mut ether_type = eth.ether_type().0;

    while ether_type == ethertype::VLAN || ether_type == ethertype::QINQ {
        let tag = data.get(offset..offset + 4)?;
        ether_type = u16::from_be_bytes([tag[2], tag[3]]);
        offset += 4;
    }

    (ether_type == ethertype::IPV4).then_some(offset)
}

fn sll_payload_offset(data: &[u8]) -> Option<usize> {
    let proto = data.get(SLL_HEADER_LEN - 2..SLL_HEADER_LEN)?;
    (u16::from_be_bytes([proto[0], proto[1]]) == ethertype::IPV4).then_some(SLL_HEADER_LEN)
}
