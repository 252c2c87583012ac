use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use super::reassembly::{InsertOutcome, Peeked, ReassemblyBuffer, StreamStats};
use super::seq::SeqSpace;
use crate::error::StreamError;

/// Directional identity of a TCP flow.
///
/// Never normalised: the two directions of one connection are two flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: Ipv4Addr, src_port: u16, dst_ip: Ipv4Addr, dst_port: u16) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    /// The opposite direction of the same connection.
    pub fn reversed(&self) -> Self {
        Self::new(self.dst_ip, self.dst_port, self.src_ip, self.src_port)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port
        )
    }
}

/// One direction of a connection being reassembled.
#[derive(Debug)]
pub struct Session {
    flow: FlowKey,
    buffer: ReassemblyBuffer,
    close_on_empty: bool,
    skip_count: u32,
    messages: u64,
}

impl Session {
    pub fn new(flow: FlowKey, initial_seq: u32, space: SeqSpace) -> Self {
        Self {
            flow,
            buffer: ReassemblyBuffer::new(initial_seq, space),
            close_on_empty: false,
            skip_count: 0,
            messages: 0,
        }
    }

    pub fn flow(&self) -> FlowKey {
        self.flow
    }

    /// Queue captured bytes; `wire_len` is the payload length on the wire.
    pub fn insert(&mut self, seq: u32, payload: &[u8], wire_len: usize) -> InsertOutcome {
        let outcome = self.buffer.insert(seq, payload, wire_len);
        if outcome.conflicting > 0 {
            warn!(
                flow = %self.flow,
                seq,
                bytes = outcome.conflicting,
                "Overlapping segment disagrees with queued data, keeping queued bytes"
            );
        }
        outcome
    }

    pub fn peek(&self, len: usize) -> Option<Peeked> {
        self.buffer.peek(len)
    }

    pub fn pull(&mut self, len: usize) -> Result<(), StreamError> {
        self.buffer
            .pull(len)
            .map_err(|short| StreamError::PullBeyondQueued {
                flow: self.flow,
                requested: short.requested,
                available: short.available,
            })
    }

    pub fn buffer(&self) -> &ReassemblyBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ReassemblyBuffer {
        &mut self.buffer
    }

    pub fn backlog(&self) -> usize {
        self.buffer.backlog()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Remember that the peer closed; the session goes once drained.
    pub fn mark_close(&mut self) {
        self.close_on_empty = true;
    }

    pub fn close_pending(&self) -> bool {
        self.close_on_empty
    }

    pub fn should_close(&self) -> bool {
        self.close_on_empty && self.buffer.is_empty()
    }

    pub fn record_skip(&mut self) {
        self.skip_count += 1;
    }

    pub fn skip_count(&self) -> u32 {
        self.skip_count
    }

    pub fn record_message(&mut self) {
        self.messages += 1;
    }

    pub fn message_count(&self) -> u64 {
        self.messages
    }

    pub fn stats(&self) -> &StreamStats {
        self.buffer.stats()
    }
}

/// Diagnostic snapshot of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBacklog {
    pub flow: FlowKey,
    /// Queued fragment count.
    pub fragments: usize,
    /// Bytes between the cursor and the end of the last fragment.
    pub queued_bytes: usize,
    pub skips: u32,
    pub close_pending: bool,
}

/// All live sessions of one trace, keyed by flow.
#[derive(Debug)]
pub struct SessionTable {
    sessions: HashMap<FlowKey, Session>,
    space: SeqSpace,
}

impl SessionTable {
    pub fn new(space: SeqSpace) -> Self {
        Self {
            sessions: HashMap::new(),
            space,
        }
    }

    /// Look up the session for `flow`, creating one anchored at `seq`.
    pub fn find_or_create(&mut self, flow: FlowKey, seq: u32) -> &mut Session {
        let space = self.space;
        self.sessions.entry(flow).or_insert_with(|| {
            debug!(flow = %flow, seq, "New session");
            Session::new(flow, seq, space)
        })
    }

    pub fn get(&self, flow: &FlowKey) -> Option<&Session> {
        self.sessions.get(flow)
    }

    pub fn get_mut(&mut self, flow: &FlowKey) -> Option<&mut Session> {
        self.sessions.get_mut(flow)
    }

    pub fn contains(&self, flow: &FlowKey) -> bool {
        self.sessions.contains_key(flow)
    }

    pub fn remove(&mut self, flow: &FlowKey) -> Result<Session, StreamError> {
        let session = self
            .sessions
            .remove(flow)
            .ok_or(StreamError::UnknownSession { flow: *flow })?;
        debug!(
            flow = %flow,
            messages = session.messages,
            skips = session.skip_count,
            "Session closed"
        );
        Ok(session)
    }

    /// Every session with its queued-fragment count, in flow order.
    pub fn list(&self) -> Vec<SessionBacklog> {
        let mut out: Vec<SessionBacklog> = self
            .sessions
            .values()
            .map(|s| SessionBacklog {
                flow: s.flow,
                fragments: s.backlog(),
                queued_bytes: s.buffer.queued_span(),
                skips: s.skip_count,
                close_pending: s.close_on_empty,
            })
            .collect();
        out.sort_by_key(|b| b.flow);
        out
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}
