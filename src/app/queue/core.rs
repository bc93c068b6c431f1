//! FIFO pending read queue
//!
//! Holds the requests that could not resolve at submission time. The
//! owning reader drains the queue on every cache growth, end-of-stream,
//! or error event; requests that became resolvable are removed in arrival
//! order and handed back for fulfilment, the rest stay queued. No request
//! is ever dropped silently: a queued request leaves only by resolving or
//! by an explicit client purge.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::errors::{StreamError, StreamFault, StreamResult};

use super::types::{evaluate, ClientId, PendingRead, QueueStats, Resolution, Tag};

/// Queue of read requests waiting for data, EOF, or an error
///
/// Not internally synchronized: the owning reader operates on it under
/// the same lock that guards the cache's committed length.
#[derive(Debug)]
pub struct PendingReadQueue {
    /// Queued requests in arrival order
    entries: VecDeque<PendingRead>,
    /// Bound on queued requests (0 = unbounded)
    max_pending: usize,
    /// Operation counters
    stats: QueueStats,
}

impl PendingReadQueue {
    /// Create an empty queue with the given pending bound (0 = unbounded)
    pub fn new(max_pending: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_pending,
            stats: QueueStats::new(),
        }
    }

    /// Number of requests currently queued
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are queued
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queue a request that could not resolve immediately
    ///
    /// Rejects a (client, tag) pair that is already outstanding and
    /// refuses to grow past the configured bound. The caller has already
    /// evaluated the request under the shared lock, so no data can have
    /// arrived between that check and this enqueue.
    pub fn enqueue(&mut self, pending: PendingRead) -> StreamResult<()> {
        let request = pending.request;

        if self.contains_tag(request.client, request.tag) {
            warn!(
                "Rejecting duplicate outstanding request: {} {}",
                request.client, request.tag
            );
            return Err(StreamError::DuplicateTag {
                client: request.client.0,
                tag: request.tag.0,
            });
        }

        if self.max_pending > 0 && self.entries.len() >= self.max_pending {
            warn!(
                "Pending read queue full ({} entries), rejecting {} {}",
                self.entries.len(),
                request.client,
                request.tag
            );
            return Err(StreamError::IllegalState {
                reason: format!("pending read limit of {} reached", self.max_pending),
            });
        }

        debug!(
            "Queued read: {} {} offset={} count={}",
            request.client, request.tag, request.offset, request.count
        );
        self.entries.push_back(pending);
        self.stats.total_enqueued += 1;
        self.stats.current_pending = self.entries.len();
        self.stats.peak_pending = self.stats.peak_pending.max(self.entries.len());
        Ok(())
    }

    /// Remove and return, in FIFO arrival order, every request that the
    /// current stream state can resolve
    ///
    /// The caller fulfils each returned request (performing the cache
    /// read for data resolutions) while still holding the shared lock,
    /// preserving FIFO completion within this drain event. Requests that
    /// remain unresolvable stay queued.
    pub fn drain_ready(
        &mut self,
        committed_len: u64,
        finished: bool,
        fault: Option<&StreamFault>,
    ) -> Vec<(PendingRead, Resolution)> {
        let mut ready = Vec::new();
        let mut still_pending = VecDeque::with_capacity(self.entries.len());

        for pending in self.entries.drain(..) {
            let resolution = evaluate(pending.request.offset, committed_len, finished, fault);
            match resolution {
                Resolution::StillPending => still_pending.push_back(pending),
                Resolution::Data => {
                    self.stats.resolved_data += 1;
                    ready.push((pending, resolution));
                }
                Resolution::Eof => {
                    self.stats.resolved_eof += 1;
                    ready.push((pending, resolution));
                }
                Resolution::Error(_) => {
                    self.stats.resolved_error += 1;
                    ready.push((pending, resolution));
                }
            }
        }

        self.entries = still_pending;
        self.stats.current_pending = self.entries.len();

        if !ready.is_empty() {
            debug!(
                "Drained {} resolvable reads, {} still pending",
                ready.len(),
                self.entries.len()
            );
        }
        ready
    }

    /// Remove all of a client's pending requests without resolving them
    ///
    /// Used when the owning connection closes. The response channels are
    /// dropped unsent, so no reply is produced for a closed connection,
    /// and the cache is untouched. Returns the number of removed
    /// requests.
    pub fn purge_client(&mut self, client: ClientId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|pending| pending.request.client != client);
        let removed = before - self.entries.len();

        if removed > 0 {
            debug!("Purged {} pending reads for {}", removed, client);
            self.stats.purged += removed as u64;
            self.stats.current_pending = self.entries.len();
        }
        removed
    }

    /// Whether a (client, tag) pair is already outstanding
    fn contains_tag(&self, client: ClientId, tag: Tag) -> bool {
        self.entries
            .iter()
            .any(|pending| pending.request.client == client && pending.request.tag == tag)
    }

    /// Current queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::queue::types::{ReadOutcome, ReadRequest};
    use tokio::sync::oneshot;

    fn request(client: u64, tag: u16, offset: u64) -> ReadRequest {
        ReadRequest {
            client: ClientId(client),
            tag: Tag(tag),
            offset,
            count: 64,
        }
    }

    fn enqueue(
        queue: &mut PendingReadQueue,
        client: u64,
        tag: u16,
        offset: u64,
    ) -> oneshot::Receiver<StreamResult<ReadOutcome>> {
        let (pending, receiver) = PendingRead::new(request(client, tag, offset));
        queue.enqueue(pending).unwrap();
        receiver
    }

    #[test]
    fn test_drain_preserves_fifo_order() {
        let mut queue = PendingReadQueue::new(0);
        let _rx1 = enqueue(&mut queue, 1, 1, 0);
        let _rx2 = enqueue(&mut queue, 2, 1, 3);
        let _rx3 = enqueue(&mut queue, 1, 2, 100);

        // Bytes 0..6 arrive: the first two requests resolve in arrival
        // order, the third stays queued.
        let ready = queue.drain_ready(6, false, None);
        assert_eq!(ready.len(), 2);
        assert_eq!(ready[0].0.request.tag, Tag(1));
        assert_eq!(ready[0].0.request.client, ClientId(1));
        assert_eq!(ready[1].0.request.client, ClientId(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_resolves_eof_after_finish() {
        let mut queue = PendingReadQueue::new(0);
        let _rx = enqueue(&mut queue, 1, 1, 10);

        assert!(queue.drain_ready(5, false, None).is_empty());

        let ready = queue.drain_ready(5, true, None);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].1, Resolution::Eof);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_flushes_error_to_all() {
        let mut queue = PendingReadQueue::new(0);
        let _rx1 = enqueue(&mut queue, 1, 1, 10);
        let _rx2 = enqueue(&mut queue, 2, 1, 50);

        let fault = StreamFault::source("connection reset");
        let ready = queue.drain_ready(5, false, Some(&fault));
        assert_eq!(ready.len(), 2);
        for (_, resolution) in &ready {
            assert_eq!(*resolution, Resolution::Error(fault.clone()));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut queue = PendingReadQueue::new(0);
        let _rx = enqueue(&mut queue, 1, 7, 10);

        let (pending, _receiver) = PendingRead::new(request(1, 7, 20));
        let err = queue.enqueue(pending).unwrap_err();
        assert!(matches!(
            err,
            StreamError::DuplicateTag { client: 1, tag: 7 }
        ));

        // Same tag from a different client is fine.
        let (pending, _receiver) = PendingRead::new(request(2, 7, 20));
        assert!(queue.enqueue(pending).is_ok());
    }

    #[test]
    fn test_pending_bound_enforced() {
        let mut queue = PendingReadQueue::new(2);
        let _rx1 = enqueue(&mut queue, 1, 1, 10);
        let _rx2 = enqueue(&mut queue, 1, 2, 20);

        let (pending, _receiver) = PendingRead::new(request(1, 3, 30));
        let err = queue.enqueue(pending).unwrap_err();
        assert!(matches!(err, StreamError::IllegalState { .. }));
    }

    #[test]
    fn test_purge_client_drops_responders_unsent() {
        let mut queue = PendingReadQueue::new(0);
        let mut rx1 = enqueue(&mut queue, 1, 1, 10);
        let _rx2 = enqueue(&mut queue, 2, 1, 10);

        assert_eq!(queue.purge_client(ClientId(1)), 1);
        assert_eq!(queue.len(), 1);

        // The purged request's channel closed without a resolution.
        assert!(rx1.try_recv().is_err());
        assert_eq!(queue.stats().purged, 1);
    }

    #[test]
    fn test_stats_track_resolutions() {
        let mut queue = PendingReadQueue::new(0);
        let _rx1 = enqueue(&mut queue, 1, 1, 0);
        let _rx2 = enqueue(&mut queue, 1, 2, 5);
        let _rx3 = enqueue(&mut queue, 1, 3, 5);

        assert_eq!(queue.stats().peak_pending, 3);

        queue.drain_ready(5, false, None);
        queue.drain_ready(5, true, None);

        let stats = queue.stats();
        assert_eq!(stats.total_enqueued, 3);
        assert_eq!(stats.resolved_data, 1);
        assert_eq!(stats.resolved_eof, 2);
        assert_eq!(stats.current_pending, 0);
    }
}
