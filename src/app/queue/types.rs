//! Core data structures for pending read queuing
//!
//! Defines the request identifiers, the outcome delivered to clients, and
//! the resolution rule applied to every request both at submission and on
//! every subsequent drain event.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::errors::{StreamFault, StreamResult};

/// Opaque handle for the client (connection/session) issuing requests
///
/// A client may hold many requests for different offsets; all of a
/// client's pending requests are purged together when its connection
/// closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Per-request tag assigned by the transport layer
///
/// At most one outstanding request may exist per (client, tag) pair; the
/// transport matches each response back to its originating tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u16);

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag-{}", self.0)
    }
}

/// A client's read request against one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    /// Issuing client
    pub client: ClientId,
    /// Transport tag for response matching
    pub tag: Tag,
    /// Requested byte offset into the stream
    pub offset: u64,
    /// Maximum number of bytes to return
    pub count: u32,
}

/// Successful result of a read request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes from the cache; non-empty by construction
    Data(Vec<u8>),
    /// End of stream: no data will ever arrive at or past the requested
    /// offset
    Eof,
}

impl ReadOutcome {
    /// The payload bytes (empty for EOF, matching the wire encoding of a
    /// zero-length read reply)
    pub fn bytes(&self) -> &[u8] {
        match self {
            ReadOutcome::Data(bytes) => bytes,
            ReadOutcome::Eof => &[],
        }
    }

    /// Whether this outcome signals end of stream
    pub fn is_eof(&self) -> bool {
        matches!(self, ReadOutcome::Eof)
    }
}

/// How a request resolves against the current stream state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Data is available at the requested offset right now
    Data,
    /// The stream has ended and no data will arrive at this offset
    Eof,
    /// The stream failed; the fault is repeated to every request
    Error(StreamFault),
    /// None of the above: the request must wait for a later event
    StillPending,
}

/// The resolution rule for a read request
///
/// Evaluated under the lock shared with the cache writer, both when a
/// request first arrives and on every drain event afterwards:
///
/// 1. A recorded fault resolves everything to that error.
/// 2. An offset below the committed length resolves to data.
/// 3. A finished stream resolves the rest to EOF.
/// 4. Otherwise the request stays pending.
pub fn evaluate(
    offset: u64,
    committed_len: u64,
    finished: bool,
    fault: Option<&StreamFault>,
) -> Resolution {
    if let Some(fault) = fault {
        return Resolution::Error(fault.clone());
    }
    if offset < committed_len {
        return Resolution::Data;
    }
    if finished {
        return Resolution::Eof;
    }
    Resolution::StillPending
}

/// A queued request together with its response channel
///
/// The oneshot sender is the registered continuation: resolving the
/// request means sending on it, purging the request means dropping it
/// without sending.
#[derive(Debug)]
pub struct PendingRead {
    /// The original request
    pub request: ReadRequest,
    /// Channel the resolution is delivered on
    pub responder: oneshot::Sender<StreamResult<ReadOutcome>>,
    /// When the request was queued
    pub enqueued_at: DateTime<Utc>,
}

impl PendingRead {
    /// Pair a request with a fresh response channel
    pub fn new(
        request: ReadRequest,
    ) -> (Self, oneshot::Receiver<StreamResult<ReadOutcome>>) {
        let (responder, receiver) = oneshot::channel();
        (
            Self {
                request,
                responder,
                enqueued_at: Utc::now(),
            },
            receiver,
        )
    }
}

/// Statistics about queue operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Requests that could not resolve immediately and were queued
    pub total_enqueued: u64,
    /// Queued requests resolved with data
    pub resolved_data: u64,
    /// Queued requests resolved with EOF
    pub resolved_eof: u64,
    /// Queued requests resolved with an error
    pub resolved_error: u64,
    /// Requests removed by client purge without resolution
    pub purged: u64,
    /// Requests currently queued
    pub current_pending: usize,
    /// Largest number of simultaneously queued requests observed
    pub peak_pending: usize,
    /// Queue creation time
    pub created_at: DateTime<Utc>,
}

impl QueueStats {
    /// Create new statistics with current timestamp
    pub fn new() -> Self {
        Self {
            total_enqueued: 0,
            resolved_data: 0,
            resolved_eof: 0,
            resolved_error: 0,
            purged: 0,
            current_pending: 0,
            peak_pending: 0,
            created_at: Utc::now(),
        }
    }
}

impl Default for QueueStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_error_takes_precedence() {
        let fault = StreamFault::source("broken pipe");
        // Even with data available at the offset, a fault wins.
        let resolution = evaluate(0, 100, true, Some(&fault));
        assert_eq!(resolution, Resolution::Error(fault));
    }

    #[test]
    fn test_evaluate_data_before_eof() {
        // Data below the committed length resolves even on a finished
        // stream.
        assert_eq!(evaluate(5, 10, true, None), Resolution::Data);
        assert_eq!(evaluate(5, 10, false, None), Resolution::Data);
    }

    #[test]
    fn test_evaluate_eof_at_committed_length() {
        assert_eq!(evaluate(10, 10, true, None), Resolution::Eof);
        assert_eq!(evaluate(25, 10, true, None), Resolution::Eof);
    }

    #[test]
    fn test_evaluate_still_pending_while_producing() {
        assert_eq!(evaluate(10, 10, false, None), Resolution::StillPending);
        assert_eq!(evaluate(25, 10, false, None), Resolution::StillPending);
        assert_eq!(evaluate(0, 0, false, None), Resolution::StillPending);
    }

    #[test]
    fn test_read_outcome_bytes() {
        let data = ReadOutcome::Data(b"abc".to_vec());
        assert_eq!(data.bytes(), b"abc");
        assert!(!data.is_eof());

        let eof = ReadOutcome::Eof;
        assert!(eof.bytes().is_empty());
        assert!(eof.is_eof());
    }

    #[test]
    fn test_pending_read_delivers_on_responder() {
        let request = ReadRequest {
            client: ClientId(1),
            tag: Tag(7),
            offset: 0,
            count: 16,
        };
        let (pending, mut receiver) = PendingRead::new(request);

        pending
            .responder
            .send(Ok(ReadOutcome::Data(b"xyz".to_vec())))
            .unwrap();

        let outcome = receiver.try_recv().unwrap().unwrap();
        assert_eq!(outcome, ReadOutcome::Data(b"xyz".to_vec()));
    }
}
