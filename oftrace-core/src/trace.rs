//! Pull-based OpenFlow message extraction from a capture.
//!
//! [`OfTrace`] reads frames only when the session it last fed has no
//! complete message left, so several messages packed into one segment are
//! handed out on consecutive calls without touching the source.

use std::io::Read;
use std::net::Ipv4Addr;
use std::path::Path;

use tracing::{debug, warn};

use crate::decode::{linktype, EndpointFilter, FrameDecoder, TcpSegment};
use crate::error::{Error, PcapError, Result};
use crate::io::{FilePacketSource, PacketReader, PacketSource, StreamPacketSource};
use crate::openflow::{OfpHeader, OfpType};
use crate::stream::{
    CorruptionGuard, FlowKey, FrameOutcome, Framer, SessionBacklog, SessionTable, StreamConfig,
};

/// One reassembled OpenFlow message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFlowMessage {
    pub flow: FlowKey,
    /// Frame whose payload completed the message.
    pub frame_number: u64,
    /// Capture time of that frame, microseconds since the epoch.
    pub timestamp_us: i64,
    pub header: OfpHeader,
    /// Full message bytes, header included.
    pub data: Vec<u8>,
    /// Some bytes were missing from the capture and are zero-filled.
    pub truncated: bool,
}

impl OpenFlowMessage {
    pub fn msg_type(&self) -> Option<OfpType> {
        self.header.ofp_type()
    }

    pub fn type_name(&self) -> &'static str {
        self.header.type_name()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn src(&self) -> (Ipv4Addr, u16) {
        (self.flow.src_ip, self.flow.src_port)
    }

    pub fn dst(&self) -> (Ipv4Addr, u16) {
        (self.flow.dst_ip, self.flow.dst_port)
    }
}

/// Counters kept across a trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceStats {
    pub frames: u64,
    pub segments: u64,
    /// Segments whose payload the snaplen cut short.
    pub truncated_segments: u64,
    pub messages: u64,
    pub truncated_messages: u64,
    pub sessions_created: u64,
    pub sessions_closed: u64,
    pub sessions_abandoned: u64,
    pub recoveries: u64,
}

/// The session last fed, with the frame that fed it.
#[derive(Debug, Clone, Copy)]
struct Active {
    flow: FlowKey,
    frame_number: u64,
    timestamp_us: i64,
}

/// OpenFlow message stream over a packet source.
pub struct OfTrace<S: PacketSource> {
    source: S,
    reader: S::Reader,
    decoder: FrameDecoder,
    framer: Framer,
    guard: CorruptionGuard,
    sessions: SessionTable,
    active: Option<Active>,
    stats: TraceStats,
}

impl OfTrace<FilePacketSource> {
    /// Open a capture file with the default controller filter and limits.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_source(
            FilePacketSource::open(path)?,
            EndpointFilter::default(),
            StreamConfig::default(),
        )
    }
}

impl<R: Read> OfTrace<StreamPacketSource<R>> {
    /// Trace a capture arriving on a byte stream (pipe, stdin).
    pub fn from_reader(reader: R) -> Result<Self> {
        Self::with_source(
            StreamPacketSource::new(reader)?,
            EndpointFilter::default(),
            StreamConfig::default(),
        )
    }
}

impl<S: PacketSource> OfTrace<S> {
    pub fn with_source(mut source: S, filter: EndpointFilter, config: StreamConfig) -> Result<Self> {
        let link_type = source.link_type() as u16;
        if !matches!(
            link_type,
            linktype::ETHERNET | linktype::RAW | linktype::LINUX_SLL
        ) {
            return Err(Error::Pcap(PcapError::UnsupportedLinkType { link_type }));
        }

        let reader = source.reader()?;
        Ok(Self {
            source,
            reader,
            decoder: FrameDecoder::new(filter),
            framer: config.framer(),
            guard: config.guard(),
            sessions: SessionTable::new(config.seq_space()),
            active: None,
            stats: TraceStats::default(),
        })
    }

    /// Next complete message, or `Ok(None)` once the source is exhausted.
    ///
    /// Errors for which [`Error::is_recoverable`] holds only cost the session
    /// they came from; calling again continues with the rest of the capture.
    pub fn next_message(&mut self) -> Result<Option<OpenFlowMessage>> {
        loop {
            if let Some(active) = self.active {
                if let Some(message) = self.drain(active)? {
                    return Ok(Some(message));
                }
                self.active = None;
            }

            let Some(packet) = self.reader.next_packet()? else {
                return Ok(None);
            };
            self.stats.frames += 1;

            if let Some(segment) = self.decoder.decode(&packet) {
                self.ingest(segment, packet.frame_number, packet.timestamp_us);
            }
        }
    }

    /// Feed one decoded segment, as if it came from frame `frame_number`.
    ///
    /// The affected session is drained by the following `next_message` calls.
    pub fn ingest(&mut self, segment: TcpSegment, frame_number: u64, timestamp_us: i64) {
        let flow = segment.flow;
        self.stats.segments += 1;
        if segment.is_truncated() {
            self.stats.truncated_segments += 1;
        }

        if segment.wire_len == 0 {
            // Bare FIN/RST
            let empty = match self.sessions.get_mut(&flow) {
                Some(session) if !session.is_empty() => {
                    session.mark_close();
                    false
                }
                Some(_) => true,
                None => return,
            };
            if empty {
                self.close_session(&flow);
            }
            return;
        }

        if !self.sessions.contains(&flow) {
            self.stats.sessions_created += 1;
        }
        let session = self.sessions.find_or_create(flow, segment.seq);
        session.insert(segment.seq, &segment.payload, segment.wire_len);
        if segment.closing {
            session.mark_close();
        }

        self.active = Some(Active {
            flow,
            frame_number,
            timestamp_us,
        });
    }

    /// Frame the next message from `active`'s session, recovering as needed.
    fn drain(&mut self, active: Active) -> Result<Option<OpenFlowMessage>> {
        let flow = active.flow;
        let Some(session) = self.sessions.get_mut(&flow) else {
            return Ok(None);
        };

        loop {
            let outcome = match self.framer.try_frame(session) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.abandon(&flow, &err);
                    self.active = None;
                    return Err(err.into());
                }
            };

            match outcome {
                FrameOutcome::Message(framed) => {
                    let close = session.should_close();
                    self.stats.messages += 1;
                    if framed.truncated {
                        self.stats.truncated_messages += 1;
                    }
                    if close {
                        self.close_session(&flow);
                    }
                    return Ok(Some(OpenFlowMessage {
                        flow,
                        frame_number: active.frame_number,
                        timestamp_us: active.timestamp_us,
                        header: framed.header,
                        data: framed.data,
                        truncated: framed.truncated,
                    }));
                }
                FrameOutcome::Malformed(err) => {
                    self.abandon(&flow, &err);
                    return Ok(None);
                }
                FrameOutcome::NeedMore => match self.guard.recover(session, &self.framer) {
                    Ok(Some(_)) => {
                        self.stats.recoveries += 1;
                        if session.should_close() {
                            self.close_session(&flow);
                            return Ok(None);
                        }
                    }
                    Ok(None) => {
                        if session.should_close() {
                            self.close_session(&flow);
                        }
                        return Ok(None);
                    }
                    Err(err) => {
                        self.abandon(&flow, &err);
                        self.active = None;
                        return Err(err.into());
                    }
                },
            }
        }
    }

    fn close_session(&mut self, flow: &FlowKey) {
        if self.sessions.remove(flow).is_ok() {
            self.stats.sessions_closed += 1;
        }
    }

    fn abandon(&mut self, flow: &FlowKey, reason: &dyn std::fmt::Display) {
        warn!(flow = %flow, %reason, "Abandoning session");
        if self.sessions.remove(flow).is_ok() {
            self.stats.sessions_abandoned += 1;
        }
    }

    /// Start over from the first frame. Fails on one-shot sources.
    pub fn rewind(&mut self) -> Result<()> {
        self.reader = self.source.reader()?;
        self.sessions.clear();
        self.active = None;
        self.stats = TraceStats::default();
        debug!("Trace rewound");
        Ok(())
    }

    /// Fraction of the source consumed, when it can be known.
    ///
    /// Unknown for streams and for compressed files, whose on-disk size says
    /// nothing about how much capture data remains.
    pub fn progress(&self) -> Option<f64> {
        let metadata = self.source.metadata();
        if !metadata.seekable || metadata.compression.is_compressed() {
            return None;
        }
        let size = metadata.size_bytes.filter(|size| *size > 0)?;
        Some((self.reader.bytes_consumed() as f64 / size as f64).min(1.0))
    }

    /// Queued fragments per live session.
    pub fn session_backlog(&self) -> Vec<SessionBacklog> {
        self.sessions.list()
    }

    pub fn stats(&self) -> &TraceStats {
        &self.stats
    }

    pub fn frames_read(&self) -> u64 {
        self.reader.frame_count()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<S: PacketSource> Iterator for OfTrace<S> {
    type Item = Result<OpenFlowMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_message().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_utils::{ethernet_frame, TcpBuilder};
    use crate::io::{PacketSourceMetadata, RawPacket};
    use crate::io::Compression;
    use crate::openflow::OFP_HEADER_LEN;
    use bytes::Bytes;
    use std::collections::VecDeque;

    const SWITCH: [u8; 4] = [10, 0, 0, 2];
    const CONTROLLER: [u8; 4] = [10, 0, 0, 1];

    /// In-memory frames.
    struct MemorySource {
        metadata: PacketSourceMetadata,
        frames: Vec<Vec<u8>>,
    }

    struct MemoryReader {
        frames: VecDeque<Vec<u8>>,
        count: u64,
    }

    impl PacketSource for MemorySource {
        type Reader = MemoryReader;

        fn metadata(&self) -> &PacketSourceMetadata {
            &self.metadata
        }

        fn reader(&mut self) -> Result<MemoryReader> {
            Ok(MemoryReader {
                frames: self.frames.iter().cloned().collect(),
                count: 0,
            })
        }
    }

    impl PacketReader for MemoryReader {
        fn next_packet(&mut self) -> Result<Option<RawPacket>> {
            Ok(self.frames.pop_front().map(|data| {
                self.count += 1;
                RawPacket {
                    frame_number: self.count,
                    timestamp_us: self.count as i64 * 1000,
                    captured_len: data.len() as u32,
                    original_len: data.len() as u32,
                    link_type: 1,
                    data: Bytes::from(data),
                }
            }))
        }

        fn frame_count(&self) -> u64 {
            self.count
        }

        fn bytes_consumed(&self) -> u64 {
            0
        }

        fn link_type(&self) -> u32 {
            1
        }
    }

    fn trace(frames: Vec<Vec<u8>>, config: StreamConfig) -> OfTrace<MemorySource> {
        let source = MemorySource {
            metadata: PacketSourceMetadata {
                link_type: 1,
                snaplen: 65535,
                size_bytes: None,
                compression: Compression::None,
                seekable: true,
            },
            frames,
        };
        OfTrace::with_source(source, EndpointFilter::default(), config).unwrap()
    }

    fn ofp(msg_type: u8, len: u16, xid: u32) -> Vec<u8> {
        let mut out = OfpHeader {
            version: 1,
            msg_type,
            length: len,
            xid,
        }
        .encode()
        .to_vec();
        out.resize(len as usize, 0x5a);
        out
    }

    fn to_controller(seq: u32, payload: &[u8]) -> Vec<u8> {
        ethernet_frame(
            SWITCH,
            CONTROLLER,
            TcpBuilder::new()
                .src_port(45000)
                .dst_port(6633)
                .seq(seq)
                .payload(payload.to_vec()),
        )
    }

    fn collect(trace: &mut OfTrace<MemorySource>) -> Vec<OpenFlowMessage> {
        let mut out = Vec::new();
        while let Some(m) = trace.next_message().unwrap() {
            out.push(m);
        }
        out
    }

    #[test]
    fn test_messages_from_one_segment_come_out_in_order() {
        let mut payload = ofp(0, 8, 1);
        payload.extend(ofp(5, 8, 2));
        let mut t = trace(vec![to_controller(1, &payload)], StreamConfig::default());

        let messages = collect(&mut t);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].msg_type(), Some(OfpType::Hello));
        assert_eq!(messages[1].header.xid, 2);
        assert!(messages.iter().all(|m| m.frame_number == 1));
        assert_eq!(t.stats().frames, 1);
    }

    #[test]
    fn test_message_completed_by_later_frame() {
        let msg = ofp(10, 40, 3);
        let frames = vec![to_controller(100, &msg[..12]), to_controller(112, &msg[12..])];
        let mut t = trace(frames, StreamConfig::default());

        let m = t.next_message().unwrap().unwrap();
        assert_eq!(m.frame_number, 2);
        assert_eq!(m.timestamp_us, 2000);
        assert_eq!(m.data, msg);
        assert!(t.next_message().unwrap().is_none());
    }

    #[test]
    fn test_malformed_header_abandons_session() {
        let mut garbage = ofp(0, 8, 0);
        garbage[0] = 0x04;
        let other = ethernet_frame(
            [10, 0, 0, 3],
            CONTROLLER,
            TcpBuilder::new().src_port(45001).dst_port(6633).seq(1).payload(ofp(2, 8, 9)),
        );
        let frames = vec![
            to_controller(1, &ofp(0, 8, 1)),
            to_controller(9, &garbage),
            other,
        ];
        let mut t = trace(frames, StreamConfig::default());

        let xids: Vec<u32> = collect(&mut t).iter().map(|m| m.header.xid).collect();
        assert_eq!(xids, vec![1, 9]);
        assert_eq!(t.stats().sessions_abandoned, 1);
        assert_eq!(t.session_backlog().len(), 1);
    }

    #[test]
    fn test_body_captured_before_header() {
        let msg = ofp(10, 40, 3);
        let frames = vec![to_controller(108, &msg[8..]), to_controller(100, &msg[..8])];
        let mut t = trace(frames, StreamConfig::default());

        let messages = collect(&mut t);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].data, msg);
        assert_eq!(messages[0].frame_number, 2);
        assert_eq!(t.stats().sessions_abandoned, 0);
        assert_eq!(t.session_backlog()[0].fragments, 0);
    }

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 0 {
            return vec![Vec::new()];
        }
        let mut out = Vec::new();
        for rest in permutations(n - 1) {
            for pos in 0..=rest.len() {
                let mut order = rest.clone();
                order.insert(pos, n - 1);
                out.push(order);
            }
        }
        out
    }

    #[test]
    fn test_any_arrival_order_yields_same_messages() {
        // Two messages, cut at offsets that split a header and both bodies
        let mut stream = ofp(14, 16, 1);
        stream.extend(ofp(10, 24, 2));
        let cuts = [0, 6, 20, 33, 40];
        let chunks: Vec<(u32, &[u8])> = cuts
            .windows(2)
            .map(|w| (500 + w[0] as u32, &stream[w[0]..w[1]]))
            .collect();

        for order in permutations(chunks.len()) {
            let frames = order
                .iter()
                .map(|&i| to_controller(chunks[i].0, chunks[i].1))
                .collect();
            let mut t = trace(frames, StreamConfig::default());

            let messages = collect(&mut t);
            let xids: Vec<u32> = messages.iter().map(|m| m.header.xid).collect();
            assert_eq!(xids, vec![1, 2], "order {order:?}");
            assert_eq!(messages[0].data, &stream[..16], "order {order:?}");
            assert_eq!(messages[1].data, &stream[16..], "order {order:?}");
            assert_eq!(t.stats().sessions_abandoned, 0, "order {order:?}");
        }
    }

    #[test]
    fn test_fin_on_drained_session_removes_it() {
        let fin = ethernet_frame(
            SWITCH,
            CONTROLLER,
            TcpBuilder::new().src_port(45000).dst_port(6633).seq(9).fin(),
        );
        let mut t = trace(vec![to_controller(1, &ofp(0, 8, 0)), fin], StreamConfig::default());

        assert_eq!(collect(&mut t).len(), 1);
        assert!(t.session_backlog().is_empty());
        assert_eq!(t.stats().sessions_closed, 1);
    }

    #[test]
    fn test_fin_with_pending_data_closes_after_drain() {
        let msg = ofp(2, 16, 0);
        let fin = ethernet_frame(
            SWITCH,
            CONTROLLER,
            TcpBuilder::new().src_port(45000).dst_port(6633).seq(9).fin(),
        );
        // Second half arrives after the FIN
        let frames = vec![to_controller(1, &msg[..8]), fin, to_controller(9, &msg[8..])];
        let mut t = trace(frames, StreamConfig::default());

        let messages = collect(&mut t);
        assert_eq!(messages.len(), 1);
        assert!(t.session_backlog().is_empty());
    }

    #[test]
    fn test_guard_bounds_backlog() {
        let config = StreamConfig {
            max_backlog: 4,
            ..StreamConfig::default()
        };
        // A header with no body, then a stream of disjoint garbage
        let mut frames = vec![to_controller(0, &ofp(14, 4000, 0)[..OFP_HEADER_LEN])];
        for i in 1..20u32 {
            frames.push(to_controller(i * 100, b"junk"));
        }
        let mut t = trace(frames, config);

        assert!(collect(&mut t).is_empty());
        let backlog = t.session_backlog();
        assert_eq!(backlog.len(), 1);
        assert!(backlog[0].fragments <= 4);
        assert!(backlog[0].skips > 0);
        assert!(t.stats().recoveries > 0);
    }

    #[test]
    fn test_rewind_replays_from_start() {
        let mut t = trace(vec![to_controller(1, &ofp(0, 8, 7))], StreamConfig::default());
        assert_eq!(collect(&mut t).len(), 1);

        t.rewind().unwrap();
        assert_eq!(t.stats().messages, 0);
        let again = collect(&mut t);
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].header.xid, 7);
    }

    #[test]
    fn test_unsupported_link_type() {
        let source = MemorySource {
            metadata: PacketSourceMetadata {
                link_type: 105,
                snaplen: 65535,
                size_bytes: None,
                compression: Compression::None,
                seekable: true,
            },
            frames: Vec::new(),
        };
        let err = OfTrace::with_source(source, EndpointFilter::default(), StreamConfig::default())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Pcap(PcapError::UnsupportedLinkType { link_type: 105 })
        ));
    }
}
