//! Subscriber cursors
//!
//! A cursor never consumes packets, it only walks positions of the shared
//! buffer. Its start position is resolved on the first read, against the
//! buffer as it is at that moment.

use std::sync::Arc;
use std::time::Duration;

use super::queue::{Queue, QueueState, Slot};
use crate::error::{QueueError, Result};
use crate::media::{CodecData, Packet};
use crate::pktque::{BufPos, PacketBuf};
use crate::stats::metrics::{self, MetricLabels};

/// Where a cursor starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStart {
    /// At the tail: only packets written after the first read
    Latest,
    /// At the head: the whole backlog first
    Oldest,
    /// At the newest packet more than this far behind the newest packet's
    /// timestamp, or at the head when the whole buffer is within reach
    DelayedTime(Duration),
    /// At the n-th most recent key-frame of the canonical video stream,
    /// at the newest packet for zero
    DelayedGopCount(usize),
}

impl CursorStart {
    /// Resolve the start position against the current buffer
    pub(crate) fn resolve(&self, buf: &PacketBuf<Slot>, video_idx: Option<usize>) -> BufPos {
        match *self {
            CursorStart::Latest => buf.tail(),
            CursorStart::Oldest => buf.head(),
            CursorStart::DelayedTime(delay) => {
                let mut pos = buf.tail().prev();
                let newest = match buf.get(pos) {
                    Some(slot) => slot.pkt.time,
                    None => return buf.tail(),
                };
                while pos > buf.head() {
                    pos = pos.prev();
                    match buf.get(pos) {
                        Some(slot) if newest.saturating_sub(slot.pkt.time) <= delay => {}
                        _ => break,
                    }
                }
                pos
            }
            CursorStart::DelayedGopCount(n) => {
                let video_idx = match video_idx {
                    Some(idx) => idx,
                    None => return buf.head(),
                };
                if n == 0 {
                    // The newest packet, if any
                    return match buf.is_empty() {
                        true => buf.tail(),
                        false => buf.tail().prev(),
                    };
                }
                let mut pos = buf.tail();
                let mut gops = 0;
                while gops < n && pos > buf.head() {
                    pos = pos.prev();
                    if let Some(slot) = buf.get(pos) {
                        if slot.pkt.idx == video_idx && slot.pkt.is_video_keyframe() {
                            gops += 1;
                        }
                    }
                }
                pos
            }
        }
    }
}

/// A subscriber's read position into a [`Queue`]
///
/// Owned by one reader. Any number of cursors may read the same queue
/// concurrently.
pub struct QueueCursor {
    queue: Arc<Queue>,
    start: CursorStart,
    pos: Option<BufPos>,
    labels: MetricLabels,
}

impl QueueCursor {
    pub(crate) fn new(queue: Arc<Queue>, start: CursorStart) -> Self {
        let labels = queue.labels.with_op("subscribe");
        Self {
            queue,
            start,
            pos: None,
            labels,
        }
    }

    /// Set the labels used for this cursor's latency reports
    pub fn with_labels(mut self, labels: MetricLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn start(&self) -> CursorStart {
        self.start
    }

    /// Current position, `None` until the first read
    pub fn position(&self) -> Option<BufPos> {
        self.pos
    }

    pub fn queue(&self) -> &Arc<Queue> {
        &self.queue
    }

    /// Wait for the queue's stream table
    pub fn streams(&self) -> Result<Vec<CodecData>> {
        self.queue.streams()
    }

    /// Async variant of [`QueueCursor::streams`]
    pub async fn streams_async(&self) -> Result<Vec<CodecData>> {
        self.queue.streams_async().await
    }

    /// Read the next packet, blocking until one is available
    ///
    /// Returns `EndOfStream` once the queue is closed and this cursor has
    /// nothing left to read.
    pub fn read_packet(&mut self) -> Result<Packet> {
        let queue = Arc::clone(&self.queue);
        let mut state = queue.state.lock();
        let mut crossed_gap = false;
        loop {
            if let Some(result) = self.poll_locked(&mut state, &mut crossed_gap) {
                return result;
            }
            queue.cond.wait(&mut state);
        }
    }

    /// Read the next packet if one is available now
    pub fn try_read_packet(&mut self) -> Option<Result<Packet>> {
        let queue = Arc::clone(&self.queue);
        let mut state = queue.state.lock();
        self.poll_locked(&mut state, &mut false)
    }

    /// Async variant of [`QueueCursor::read_packet`]
    pub async fn recv(&mut self) -> Result<Packet> {
        let queue = Arc::clone(&self.queue);
        let mut crossed_gap = false;
        loop {
            let notified = queue.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let polled = {
                let mut state = queue.state.lock();
                self.poll_locked(&mut state, &mut crossed_gap)
            };
            if let Some(result) = polled {
                return result;
            }
            notified.await;
        }
    }

    /// One pass of the read loop, with the monitor held
    ///
    /// `None` means the caller has to wait for the writer.
    fn poll_locked(
        &mut self,
        state: &mut QueueState,
        crossed_gap: &mut bool,
    ) -> Option<Result<Packet>> {
        let head = state.buf.head();
        let tail = state.buf.tail();

        let mut pos = match self.pos {
            Some(pos) => pos,
            None => {
                let pos = self.start.resolve(&state.buf, state.video_idx);
                tracing::debug!(
                    who = %self.labels.who,
                    start = ?self.start,
                    pos = %pos,
                    head = %head,
                    tail = %tail,
                    "Cursor start resolved"
                );
                pos
            }
        };

        if pos < head {
            tracing::debug!(who = %self.labels.who, pos = %pos, head = %head, "Cursor behind head");
            pos = head;
            *crossed_gap = true;
        } else if pos > tail {
            tracing::debug!(who = %self.labels.who, pos = %pos, tail = %tail, "Cursor past tail");
            pos = tail;
            *crossed_gap = true;
        }
        self.pos = Some(pos);

        if let Some(slot) = state.buf.get(pos) {
            let mut pkt = slot.pkt.clone();
            let latency = slot.enqueued_at.elapsed();
            if *crossed_gap && state.jumped {
                pkt.jumped = true;
                state.jumped = false;
            }
            self.pos = Some(pos.next());
            self.queue.metrics.set_gauge(
                metrics::FRAME_LATENCY,
                &self.labels,
                latency.as_secs_f64() * 1000.0,
            );
            return Some(Ok(pkt));
        }

        if state.closed {
            return Some(Err(QueueError::EndOfStream));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Instant;

    use bytes::Bytes;

    use super::*;
    use crate::media::fixtures::AVC_RECORD;
    use crate::stats::MemoryMetrics;
    use crate::QueueConfig;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn video(t: u64, key: bool) -> Packet {
        Packet::video(ms(t), Bytes::from_static(&[0u8; 8]), key)
    }

    fn audio(t: u64) -> Packet {
        Packet::audio(ms(t), Bytes::from_static(&[0u8; 4])).with_index(1)
    }

    fn avc_header(t: u64) -> Packet {
        Packet::video(ms(t), Bytes::from_static(AVC_RECORD), true).sequence_header()
    }

    fn buf_of(packets: Vec<Packet>) -> PacketBuf<Slot> {
        let mut buf = PacketBuf::with_capacity(4);
        for pkt in packets {
            buf.push(Slot::at(pkt, Instant::now()));
        }
        buf
    }

    /// K1 a b K2 c d K3 e
    fn three_gops() -> PacketBuf<Slot> {
        buf_of(vec![
            video(0, true),
            audio(5),
            video(10, false),
            video(20, true),
            audio(25),
            video(30, false),
            video(40, true),
            audio(45),
        ])
    }

    #[test]
    fn test_resolve_latest_and_oldest() {
        let buf = three_gops();
        assert_eq!(CursorStart::Latest.resolve(&buf, Some(0)), BufPos(8));
        assert_eq!(CursorStart::Oldest.resolve(&buf, Some(0)), BufPos(0));
    }

    #[test]
    fn test_resolve_delayed_gop_count() {
        let buf = three_gops();
        assert_eq!(CursorStart::DelayedGopCount(1).resolve(&buf, Some(0)), BufPos(6));
        assert_eq!(CursorStart::DelayedGopCount(2).resolve(&buf, Some(0)), BufPos(3));
        assert_eq!(CursorStart::DelayedGopCount(3).resolve(&buf, Some(0)), BufPos(0));
        // Fewer key-frames than asked for: oldest
        assert_eq!(CursorStart::DelayedGopCount(9).resolve(&buf, Some(0)), BufPos(0));
        // Zero GOPs starts at the newest packet
        assert_eq!(CursorStart::DelayedGopCount(0).resolve(&buf, Some(0)), BufPos(7));
    }

    #[test]
    fn test_resolve_delayed_gop_count_without_video() {
        let buf = three_gops();
        assert_eq!(CursorStart::DelayedGopCount(1).resolve(&buf, None), BufPos(0));
    }

    #[test]
    fn test_resolve_delayed_gop_count_ignores_other_streams() {
        let buf = buf_of(vec![
            video(0, true),
            video(10, true).with_index(2),
            video(20, false),
        ]);
        assert_eq!(CursorStart::DelayedGopCount(1).resolve(&buf, Some(0)), BufPos(0));
    }

    #[test]
    fn test_resolve_delayed_time() {
        let buf = three_gops();
        // newest is 45ms; the packet at 20ms is the first more than 20ms back
        assert_eq!(CursorStart::DelayedTime(ms(20)).resolve(&buf, None), BufPos(3));
        assert_eq!(CursorStart::DelayedTime(ms(0)).resolve(&buf, None), BufPos(6));
        assert_eq!(CursorStart::DelayedTime(ms(1000)).resolve(&buf, None), BufPos(0));
    }

    #[test]
    fn test_resolve_on_empty_buffer() {
        let mut buf = three_gops();
        buf.drain().for_each(drop);
        for start in [
            CursorStart::Latest,
            CursorStart::Oldest,
            CursorStart::DelayedTime(ms(100)),
            CursorStart::DelayedGopCount(2),
            CursorStart::DelayedGopCount(0),
        ] {
            assert_eq!(start.resolve(&buf, Some(0)), BufPos(8));
        }
    }

    #[test]
    fn test_delayed_time_starts_outside_window() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(video(0, true)).unwrap();
        for t in (10..=50).step_by(10) {
            queue.write_packet(video(t, false)).unwrap();
        }

        // 50 - 20 = 30 is past the 25ms window
        let mut cursor = queue.delayed_time(ms(25));
        assert_eq!(cursor.read_packet().unwrap().time, ms(20));
        assert_eq!(cursor.read_packet().unwrap().time, ms(30));
    }

    #[test]
    fn test_delayed_gop_count_zero_reads_newest() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(avc_header(0)).unwrap();
        queue.write_packet(video(10, true)).unwrap();
        queue.write_packet(audio(15)).unwrap();
        queue.write_packet(video(20, false)).unwrap();
        assert_eq!(queue.video_index(), Some(0));

        let mut cursor = queue.delayed_gop_count(0);
        assert_eq!(cursor.read_packet().unwrap().time, ms(20));
        assert!(cursor.try_read_packet().is_none());
    }

    #[test]
    fn test_oldest_reads_in_order_then_blocks() {
        let queue = Arc::new(Queue::new());
        let v0 = video(0, true);
        let a0 = audio(5);
        let v1 = video(10, false);
        for pkt in [&v0, &a0, &v1] {
            queue.write_packet(pkt.clone()).unwrap();
        }

        let mut cursor = queue.oldest();
        assert_eq!(cursor.read_packet().unwrap(), v0);
        assert_eq!(cursor.read_packet().unwrap(), a0);
        assert_eq!(cursor.read_packet().unwrap(), v1);
        assert!(cursor.try_read_packet().is_none());
    }

    #[test]
    fn test_start_is_resolved_on_first_read() {
        let queue = Arc::new(Queue::new());
        let mut cursor = queue.oldest();
        assert_eq!(cursor.position(), None);

        queue.write_packet(video(0, true)).unwrap();
        queue.write_packet(video(10, false)).unwrap();

        assert_eq!(cursor.read_packet().unwrap().time, ms(0));
        assert_eq!(cursor.position(), Some(BufPos(1)));
    }

    #[test]
    fn test_latest_skips_backlog() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(video(0, true)).unwrap();
        queue.write_packet(video(10, false)).unwrap();

        let mut cursor = queue.latest();
        assert!(cursor.try_read_packet().is_none());

        queue.write_packet(video(20, false)).unwrap();
        assert_eq!(cursor.read_packet().unwrap().time, ms(20));
    }

    #[test]
    fn test_snap_after_drain_with_header_sets_jumped() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(avc_header(0)).unwrap();
        queue.write_packet(audio(5)).unwrap();
        queue.write_packet(video(10, false)).unwrap();

        let mut cursor = queue.oldest();
        assert!(cursor.read_packet().unwrap().is_seq_header);

        let key = video(20, true);
        queue.write_packet(key.clone()).unwrap();

        let pkt = cursor.read_packet().unwrap();
        assert!(pkt.jumped);
        assert_eq!(pkt.time, key.time);
        assert_eq!(cursor.position(), Some(BufPos(4)));
        // The buffered original stays clean
        assert!(!queue.snapshot()[0].jumped);
    }

    #[test]
    fn test_snap_without_dropped_header_is_silent() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(video(0, true)).unwrap();
        queue.write_packet(audio(5)).unwrap();

        let mut cursor = queue.oldest();
        cursor.read_packet().unwrap();

        queue.write_packet(video(20, true)).unwrap();
        let pkt = cursor.read_packet().unwrap();
        assert_eq!(pkt.time, ms(20));
        assert!(!pkt.jumped);
    }

    #[test]
    fn test_jumped_consumed_by_first_reader_only() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(avc_header(0)).unwrap();
        queue.write_packet(video(10, false)).unwrap();

        let mut first = queue.oldest();
        let mut second = queue.oldest();
        first.read_packet().unwrap();
        second.read_packet().unwrap();

        queue.write_packet(video(20, true)).unwrap();
        assert!(first.read_packet().unwrap().jumped);
        assert!(!second.read_packet().unwrap().jumped);
    }

    #[test]
    fn test_first_read_after_eviction_is_not_a_gap() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(avc_header(0)).unwrap();
        queue.write_packet(video(20, true)).unwrap();

        // Lazily resolved at head, so it never crossed anything
        let mut cursor = queue.oldest();
        assert!(!cursor.read_packet().unwrap().jumped);
    }

    #[test]
    fn test_close_returns_buffered_then_end_of_stream() {
        let queue = Arc::new(Queue::new());
        queue.write_packet(video(0, true)).unwrap();
        queue.close();

        let mut oldest = queue.oldest();
        assert!(oldest.read_packet().is_ok());
        assert_eq!(oldest.read_packet(), Err(QueueError::EndOfStream));
        assert_eq!(oldest.read_packet(), Err(QueueError::EndOfStream));

        let mut latest = queue.latest();
        assert_eq!(latest.read_packet(), Err(QueueError::EndOfStream));
    }

    #[test]
    fn test_close_wakes_blocked_readers() {
        let queue = Arc::new(Queue::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let mut cursor = queue.latest();
                thread::spawn(move || cursor.read_packet())
            })
            .collect();

        thread::sleep(ms(20));
        queue.close();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), Err(QueueError::EndOfStream));
        }
    }

    #[test]
    fn test_blocked_reader_wakes_on_write() {
        let queue = Arc::new(Queue::new());
        let mut cursor = queue.latest();
        // Resolve the start before the write so the reader waits for it
        assert!(cursor.try_read_packet().is_none());

        let reader = thread::spawn(move || cursor.read_packet());
        thread::sleep(ms(20));
        queue.write_packet(video(7, true)).unwrap();

        assert_eq!(reader.join().unwrap().unwrap().time, ms(7));
    }

    #[test]
    fn test_concurrent_readers_see_same_sequence() {
        let queue = Arc::new(Queue::new());
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let mut cursor = queue.oldest();
                thread::spawn(move || {
                    let mut times = Vec::new();
                    while let Ok(pkt) = cursor.read_packet() {
                        times.push(pkt.time);
                    }
                    times
                })
            })
            .collect();

        for i in 0..100 {
            queue.write_packet(video(i, false)).unwrap();
        }
        queue.close();

        let expected: Vec<_> = (0..100).map(ms).collect();
        for reader in readers {
            assert_eq!(reader.join().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_recv_pending_until_write() {
        let queue = Arc::new(Queue::new());
        let mut cursor = queue.latest();

        {
            let mut task = tokio_test::task::spawn(cursor.recv());
            tokio_test::assert_pending!(task.poll());

            queue.write_packet(video(33, false)).unwrap();
            assert!(task.is_woken());
            let pkt = tokio_test::assert_ready!(task.poll()).unwrap();
            assert_eq!(pkt.time, ms(33));
        }

        queue.close();
        assert_eq!(cursor.recv().await, Err(QueueError::EndOfStream));
    }

    #[tokio::test]
    async fn test_recv_across_tasks() {
        let queue = Arc::new(Queue::new());
        let mut cursor = queue.oldest();

        let reader = tokio::spawn(async move {
            let mut count = 0;
            while cursor.recv().await.is_ok() {
                count += 1;
            }
            count
        });

        for i in 0..10 {
            queue.write_packet(audio(i)).unwrap();
            tokio::task::yield_now().await;
        }
        queue.close();

        assert_eq!(reader.await.unwrap(), 10);
    }

    #[test]
    fn test_latency_reported_under_cursor_labels() {
        let sink = Arc::new(MemoryMetrics::new());
        let queue = Arc::new(Queue::with_metrics(QueueConfig::default(), sink.clone()));
        let labels = MetricLabels::new("viewer-1", "subscribe");

        let mut cursor = queue.oldest().with_labels(labels.clone());
        queue.write_packet(video(0, true)).unwrap();
        cursor.read_packet().unwrap();

        let latency = sink.gauge(metrics::FRAME_LATENCY, &labels).unwrap();
        assert!(latency >= 0.0);
    }

    #[test]
    fn test_streams_via_cursor() {
        let queue = Arc::new(Queue::new());
        let cursor = queue.delayed_gop_count(1);
        queue.close();
        assert_eq!(cursor.streams(), Err(QueueError::EndOfStream));
        assert_eq!(cursor.start(), CursorStart::DelayedGopCount(1));
    }
}
