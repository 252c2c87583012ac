use super::session::Session;
use crate::error::StreamError;
use crate::openflow::{HeaderError, OfpHeader, OfpType, OFP_HEADER_LEN};

/// One complete message cut from a session's byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedMessage {
    pub header: OfpHeader,
    /// The whole message, header included.
    pub data: Vec<u8>,
    /// Part of `data` is zero padding for bytes the capture did not keep.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Message(FramedMessage),
    /// Not enough contiguous bytes for the next header or body.
    NeedMore,
    /// The bytes at the cursor are not a valid header.
    Malformed(HeaderError),
}

/// Cuts length-prefixed OpenFlow messages out of a session.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    expected_version: u8,
    max_message_len: usize,
}

impl Framer {
    pub fn new(expected_version: u8, max_message_len: usize) -> Self {
        Self {
            expected_version,
            max_message_len,
        }
    }

    /// Check a header against version, type range and length bounds.
    pub fn validate(&self, header: &OfpHeader) -> Result<(), HeaderError> {
        if header.version != self.expected_version {
            return Err(HeaderError::BadVersion {
                found: header.version,
                expected: self.expected_version,
            });
        }
        if OfpType::from_u8(header.msg_type).is_none() {
            return Err(HeaderError::BadType(header.msg_type));
        }
        let length = header.length as usize;
        if length < OFP_HEADER_LEN || length > self.max_message_len {
            return Err(HeaderError::BadLength {
                length: header.length,
                min: OFP_HEADER_LEN,
                max: self.max_message_len,
            });
        }
        Ok(())
    }

    /// Parse and validate a header from raw bytes.
    pub fn header_at(&self, bytes: &[u8]) -> Option<Result<OfpHeader, HeaderError>> {
        let header = OfpHeader::parse(bytes)?;
        Some(self.validate(&header).map(|_| header))
    }

    /// Try to take the next message off the front of `session`.
    ///
    /// Once the cursor is anchored the header is validated as soon as it is
    /// visible, so a garbage length never leaves the session waiting for a
    /// body that will not come. Before that, the bytes at the cursor may be
    /// the middle of a message whose start has not arrived yet, so a bad
    /// header only means waiting; the guard bounds what piles up meanwhile.
    /// The session is only consumed when a whole message is ready.
    pub fn try_frame(&self, session: &mut Session) -> Result<FrameOutcome, StreamError> {
        let Some(head) = session.peek(OFP_HEADER_LEN) else {
            return Ok(FrameOutcome::NeedMore);
        };
        let header = match self.header_at(&head.bytes) {
            Some(Ok(header)) => header,
            Some(Err(err)) if session.buffer().is_anchored() => {
                return Ok(FrameOutcome::Malformed(err))
            }
            Some(Err(_)) | None => return Ok(FrameOutcome::NeedMore),
        };

        let Some(body) = session.peek(header.length as usize) else {
            return Ok(FrameOutcome::NeedMore);
        };
        session.pull(body.bytes.len())?;
        session.record_message();

        Ok(FrameOutcome::Message(FramedMessage {
            header,
            data: body.bytes,
            truncated: body.padded,
        }))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(
            crate::openflow::OFP_VERSION,
            crate::openflow::DEFAULT_MAX_MESSAGE_LEN,
        )
    }
}
