use std::collections::VecDeque;

use smallvec::SmallVec;

use super::seq::{seq_add, SeqSpace};

/// A run of bytes from one flow waiting to be consumed.
///
/// Bytes past `captured` are zero padding for data the capture snaplen
/// dropped. Padding only ever sits at the tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    seq: u32,
    data: Vec<u8>,
    captured: usize,
}

impl Fragment {
    /// Build a fragment from captured bytes, zero-padded to `wire_len`.
    pub fn padded(seq: u32, payload: &[u8], wire_len: usize) -> Self {
        let len = wire_len.max(payload.len());
        let mut data = Vec::with_capacity(len);
        data.extend_from_slice(payload);
        data.resize(len, 0);
        Self {
            seq,
            data,
            captured: payload.len(),
        }
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Sequence number one past the last byte.
    pub fn end(&self) -> u32 {
        seq_add(self.seq, self.data.len())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of leading bytes that were really captured.
    pub fn captured(&self) -> usize {
        self.captured
    }

    /// Split off the first `n` bytes as their own fragment.
    fn split_to(&mut self, n: usize) -> Fragment {
        let tail = self.data.split_off(n);
        let head = std::mem::replace(&mut self.data, tail);
        let head_captured = self.captured.min(n);
        self.captured -= head_captured;
        let front = Fragment {
            seq: self.seq,
            data: head,
            captured: head_captured,
        };
        self.seq = seq_add(self.seq, n);
        front
    }

    /// Drop the first `n` bytes.
    fn advance(&mut self, n: usize) {
        self.data.drain(..n);
        self.seq = seq_add(self.seq, n);
        self.captured = self.captured.saturating_sub(n);
    }
}

/// Bytes returned by [`ReassemblyBuffer::peek`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peeked {
    pub bytes: Vec<u8>,
    /// Some of `bytes` are snaplen padding rather than captured data.
    pub padded: bool,
}

/// What one insertion did to the buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// New bytes queued.
    pub queued: usize,
    /// Bytes already present with identical content (or already consumed).
    pub duplicate: usize,
    /// Bytes already present with different content; the old bytes won.
    pub conflicting: usize,
}

/// A pull that asked for more than the buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: usize,
    pub available: usize,
}

/// Reassembly statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub segment_count: u32,
    pub retransmit_count: u32,
    pub conflict_count: u32,
    pub out_of_order_count: u32,
    /// Hole bytes the cursor jumped over.
    pub bytes_skipped: u64,
    /// Queued bytes thrown away by recovery.
    pub bytes_dropped: u64,
}

/// Ordered, non-overlapping fragments of one direction of a TCP flow.
///
/// Until the first byte is consumed the cursor follows the earliest
/// fragment, so data that arrives ahead of its predecessors is simply
/// re-anchored. Once anything has been pulled the cursor is fixed and
/// only moves forward; late bytes before it are retransmissions.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    space: SeqSpace,
    /// Next expected sequence number.
    cursor: u32,
    /// Set once bytes have left the buffer.
    anchored: bool,
    fragments: VecDeque<Fragment>,
    stats: StreamStats,
}

impl ReassemblyBuffer {
    pub fn new(initial_seq: u32, space: SeqSpace) -> Self {
        Self {
            space,
            cursor: initial_seq,
            anchored: false,
            fragments: VecDeque::new(),
            stats: StreamStats::default(),
        }
    }

    /// Queue `payload` at `seq`, padding it to `wire_len` bytes.
    ///
    /// Overlaps with queued fragments are carved away so the stored
    /// fragments never overlap; where they disagree the stored bytes win.
    pub fn insert(&mut self, seq: u32, payload: &[u8], wire_len: usize) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        let mut fragment = Fragment::padded(seq, payload, wire_len);
        if fragment.is_empty() {
            return outcome;
        }
        self.stats.segment_count += 1;

        // Bytes behind an anchored cursor were already handed out.
        if self.anchored && self.space.lt(fragment.seq, self.cursor) {
            if self.space.le(fragment.end(), self.cursor) {
                self.stats.retransmit_count += 1;
                outcome.duplicate = fragment.len();
                return outcome;
            }
            let stale = SeqSpace::distance(fragment.seq, self.cursor);
            fragment.advance(stale);
            outcome.duplicate += stale;
        }

        let mut pieces: SmallVec<[Fragment; 2]> = SmallVec::new();
        let mut rest = Some(fragment);
        for existing in &self.fragments {
            let Some(mut current) = rest.take() else {
                break;
            };
            if self.space.le(current.end(), existing.seq) {
                rest = Some(current);
                break;
            }
            if self.space.le(existing.end(), current.seq) {
                rest = Some(current);
                continue;
            }

            if self.space.lt(current.seq, existing.seq) {
                let lead = SeqSpace::distance(current.seq, existing.seq);
                pieces.push(current.split_to(lead));
            }

            let offset = SeqSpace::distance(existing.seq, current.seq);
            let overlap = (existing.len() - offset).min(current.len());
            // Padding carries no information, compare captured bytes only.
            let comparable = existing
                .captured
                .saturating_sub(offset)
                .min(current.captured)
                .min(overlap);
            if existing.data[offset..offset + comparable] != current.data[..comparable] {
                outcome.conflicting += overlap;
            } else {
                outcome.duplicate += overlap;
            }
            current.advance(overlap);

            if !current.is_empty() {
                rest = Some(current);
            }
        }
        if let Some(current) = rest {
            pieces.push(current);
        }

        if outcome.conflicting > 0 {
            self.stats.conflict_count += 1;
        } else if pieces.is_empty() {
            self.stats.retransmit_count += 1;
        }

        for piece in pieces {
            outcome.queued += piece.len();
            let idx = self
                .fragments
                .partition_point(|f| self.space.lt(f.seq, piece.seq));
            if idx < self.fragments.len() {
                self.stats.out_of_order_count += 1;
            }
            self.fragments.insert(idx, piece);
        }

        if !self.anchored {
            if let Some(front) = self.fragments.front() {
                self.cursor = front.seq;
            }
        }

        outcome
    }

    /// Copy `len` contiguous bytes starting at the cursor without consuming.
    ///
    /// Returns `None` when fewer than `len` contiguous bytes are queued.
    pub fn peek(&self, len: usize) -> Option<Peeked> {
        let mut bytes = Vec::with_capacity(len);
        let mut padded = false;
        let mut expected = self.cursor;

        for fragment in &self.fragments {
            if bytes.len() == len || fragment.seq != expected {
                break;
            }
            let take = (len - bytes.len()).min(fragment.len());
            bytes.extend_from_slice(&fragment.data[..take]);
            padded |= take > fragment.captured;
            expected = fragment.end();
        }

        (bytes.len() == len).then_some(Peeked { bytes, padded })
    }

    /// Consume `len` bytes from the front.
    ///
    /// Holes inside the consumed range are skipped and count against `len`.
    /// Asking for more than the queued span fails without touching state.
    pub fn pull(&mut self, len: usize) -> Result<(), Shortfall> {
        let available = self.queued_span();
        if len > available {
            return Err(Shortfall {
                requested: len,
                available,
            });
        }

        let mut remaining = len;
        while remaining > 0 {
            let Some(front) = self.fragments.front_mut() else {
                break;
            };

            if front.seq != self.cursor {
                let hole = SeqSpace::distance(self.cursor, front.seq);
                let skip = hole.min(remaining);
                self.cursor = seq_add(self.cursor, skip);
                self.stats.bytes_skipped += skip as u64;
                remaining -= skip;
                continue;
            }

            if front.len() <= remaining {
                remaining -= front.len();
                self.cursor = front.end();
                self.fragments.pop_front();
            } else {
                front.advance(remaining);
                self.cursor = front.seq;
                remaining = 0;
            }
        }

        self.anchored = true;
        Ok(())
    }

    /// Size of the hole between the cursor and the first fragment, if any.
    pub fn front_hole(&self) -> Option<usize> {
        self.fragments
            .front()
            .filter(|f| f.seq != self.cursor)
            .map(|f| SeqSpace::distance(self.cursor, f.seq))
    }

    /// Move the cursor over the hole in front of the first fragment.
    pub fn skip_hole(&mut self) -> usize {
        let hole = self.front_hole().unwrap_or(0);
        self.cursor = seq_add(self.cursor, hole);
        self.stats.bytes_skipped += hole as u64;
        self.anchored = true;
        hole
    }

    /// Discard the first fragment and move the cursor to whatever follows.
    pub fn drop_front(&mut self) -> Option<Fragment> {
        let dropped = self.fragments.pop_front()?;
        self.cursor = self
            .fragments
            .front()
            .map_or_else(|| dropped.end(), |next| next.seq);
        self.stats.bytes_dropped += dropped.len() as u64;
        self.anchored = true;
        Some(dropped)
    }

    pub fn front(&self) -> Option<&Fragment> {
        self.fragments.front()
    }

    pub fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter()
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Whether the cursor is fixed, i.e. bytes have been consumed or skipped.
    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Number of queued fragments.
    pub fn backlog(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Bytes from the cursor to the end of the last fragment, holes included.
    pub fn queued_span(&self) -> usize {
        self.fragments
            .back()
            .map_or(0, |last| SeqSpace::distance(self.cursor, last.end()))
    }

    /// Contiguous bytes available at the cursor.
    pub fn contiguous_len(&self) -> usize {
        let mut expected = self.cursor;
        let mut total = 0;
        for fragment in &self.fragments {
            if fragment.seq != expected {
                break;
            }
            total += fragment.len();
            expected = fragment.end();
        }
        total
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}
