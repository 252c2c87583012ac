use tracing::warn;

use super::framer::Framer;
use super::session::Session;
use crate::error::StreamError;
use crate::openflow::OFP_HEADER_LEN;

/// Action taken by one recovery step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Cursor jumped over a hole to a fragment that starts with a header.
    SkippedHole { bytes: usize },
    /// A header at the cursor claimed more bytes than were contiguous;
    /// that many were consumed anyway.
    ForcedPull { bytes: usize },
    /// First fragment did not start with a usable header and was discarded.
    DroppedFragment { bytes: usize },
}

/// Bounds the backlog of sessions whose bytes stop framing.
#[derive(Debug, Clone, Copy)]
pub struct CorruptionGuard {
    max_backlog: usize,
}

impl CorruptionGuard {
    pub fn new(max_backlog: usize) -> Self {
        Self { max_backlog }
    }

    pub fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    pub fn needs_recovery(&self, session: &Session) -> bool {
        session.backlog() > self.max_backlog
    }

    /// Take one recovery step on `session`, if it is over the threshold.
    ///
    /// Callers alternate this with framing until the framer makes progress
    /// or the backlog is back under the threshold.
    pub fn recover(
        &self,
        session: &mut Session,
        framer: &Framer,
    ) -> Result<Option<Recovery>, StreamError> {
        if !self.needs_recovery(session) {
            return Ok(None);
        }
        let Some(front) = session.buffer().front() else {
            return Ok(None);
        };

        let declared = front
            .data()
            .get(..OFP_HEADER_LEN)
            .and_then(|bytes| framer.header_at(bytes))
            .and_then(|res| res.ok())
            .map(|header| header.length as usize);
        let hole = session.buffer().front_hole();

        let action = match (hole, declared) {
            (Some(_), Some(_)) => Recovery::SkippedHole {
                bytes: session.buffer_mut().skip_hole(),
            },
            (None, Some(declared)) => {
                let bytes = declared.min(session.buffer().queued_span());
                session.pull(bytes)?;
                Recovery::ForcedPull { bytes }
            }
            (_, None) => {
                let bytes = session
                    .buffer_mut()
                    .drop_front()
                    .map_or(0, |f| f.len());
                Recovery::DroppedFragment { bytes }
            }
        };

        session.record_skip();
        warn!(
            flow = %session.flow(),
            backlog = session.backlog(),
            skips = session.skip_count(),
            ?action,
            "Backlog over limit, skipping unframeable data"
        );
        Ok(Some(action))
    }
}
