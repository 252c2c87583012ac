//! TCP reassembly and OpenFlow message framing.

mod framer;
mod guard;
mod reassembly;
mod seq;
mod session;

pub use framer::{FrameOutcome, FramedMessage, Framer};
pub use guard::{CorruptionGuard, Recovery};
pub use reassembly::{Fragment, InsertOutcome, Peeked, ReassemblyBuffer, Shortfall, StreamStats};
pub use seq::{seq_add, SeqSpace, DEFAULT_SEQ_WINDOW};
pub use session::{FlowKey, Session, SessionBacklog, SessionTable};

use crate::openflow::{DEFAULT_MAX_MESSAGE_LEN, OFP_VERSION};

/// Configuration for reassembly and framing.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Sequence distance beyond which ordering assumes wraparound.
    pub seq_window: u32,
    /// Queued fragments per session before the corruption guard steps in.
    pub max_backlog: usize,
    /// Header version every framed message must carry.
    pub expected_version: u8,
    /// Largest declared message length accepted.
    pub max_message_len: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            seq_window: DEFAULT_SEQ_WINDOW,
            max_backlog: 64,
            expected_version: OFP_VERSION,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl StreamConfig {
    pub fn seq_space(&self) -> SeqSpace {
        SeqSpace::new(self.seq_window)
    }

    pub fn framer(&self) -> Framer {
        Framer::new(self.expected_version, self.max_message_len)
    }

    pub fn guard(&self) -> CorruptionGuard {
        CorruptionGuard::new(self.max_backlog)
    }
}
