//! # oftrace-core
//!
//! Reconstructs OpenFlow control-channel messages from packet captures.
//!
//! Captured TCP payloads arrive split, reordered and retransmitted. This
//! crate reassembles each direction of each switch-controller connection
//! into a byte stream and cuts length-prefixed OpenFlow messages out of it,
//! with bounded memory when a stream stops making sense.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oftrace_core::OfTrace;
//!
//! let mut trace = OfTrace::open("controller.pcap").unwrap();
//! while let Some(msg) = trace.next_message().unwrap() {
//!     println!("{} {} xid={}", msg.flow, msg.type_name(), msg.header.xid);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                          oftrace-core                               |
//! +---------------------------------------------------------------------+
//! |  io/        - PacketSource, PacketReader, gzip, pcap/pcapng parsing |
//! |  pcap/      - PcapReader (format and compression detection)         |
//! |  decode/    - Ethernet/VLAN/SLL -> IPv4 -> TCP segment, filter      |
//! |  stream/    - sequence space, reassembly, sessions, framer, guard   |
//! |  openflow   - OpenFlow 1.0 header and type codes                    |
//! |  trace      - OfTrace: pull-based message iteration                 |
//! |  error      - Error types                                           |
//! +---------------------------------------------------------------------+
//! ```

pub mod decode;
pub mod error;
pub mod io;
pub mod openflow;
pub mod pcap;
pub mod stream;
pub mod trace;

pub use decode::{EndpointFilter, FrameDecoder, TcpSegment};
pub use error::{Error, PcapError, Result, StreamError};
pub use openflow::{OfpHeader, OfpType, OFP_TCP_PORT};
pub use stream::{FlowKey, SessionBacklog, StreamConfig};
pub use trace::{OfTrace, OpenFlowMessage, TraceStats};
