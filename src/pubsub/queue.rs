//! One publisher, many subscribers packet queue
//!
//! ```text
//!          time
//!   ----------------->
//!
//!   V-A-V-V-A-V-V-A-V-V
//!   |                 |
//!   head            tail
//!   oldest          latest
//! ```
//!
//! All shared state sits behind one mutex. Every write broadcasts on both a
//! condition variable (blocking readers) and a `Notify` (async readers).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use super::config::QueueConfig;
use super::cursor::{CursorStart, QueueCursor};
use crate::error::{QueueError, Result};
use crate::media::{decode_aac_config, decode_avc_config, CodecData, MediaKind, Packet};
use crate::pktque::{BufPos, PacketBuf};
use crate::stats::metrics::{self, MetricLabels, MetricsSink, NoopMetrics};

/// A buffered packet and the moment it was accepted
#[derive(Debug)]
pub(crate) struct Slot {
    pub(crate) pkt: Packet,
    pub(crate) enqueued_at: Instant,
}

impl Slot {
    pub(crate) fn at(pkt: Packet, enqueued_at: Instant) -> Self {
        Self { pkt, enqueued_at }
    }
}

/// State guarded by the queue's monitor
pub(crate) struct QueueState {
    pub(crate) buf: PacketBuf<Slot>,
    pub(crate) streams: Option<Vec<CodecData>>,
    pub(crate) video_idx: Option<usize>,
    pub(crate) audio_idx: Option<usize>,
    pub(crate) closed: bool,
    /// An eviction dropped a sequence header; consumed by the first reader that crosses the gap
    pub(crate) jumped: bool,
    max_gop_count: usize,
    first_packet_at: Option<Instant>,
    seen_keyframe: bool,
}

impl QueueState {
    /// Replace the descriptor for this codec's media kind, or append a new one
    fn update_stream(&mut self, codec: CodecData) -> usize {
        let streams = self.streams.get_or_insert_with(Vec::new);
        let index = if codec.is_video() {
            &mut self.video_idx
        } else {
            &mut self.audio_idx
        };

        match *index {
            Some(idx) if idx < streams.len() => {
                streams[idx] = codec;
                idx
            }
            _ => {
                let idx = streams.len();
                streams.push(codec);
                *index = Some(idx);
                idx
            }
        }
    }
}

/// Single-writer, multi-reader packet queue
///
/// Share it as `Arc<Queue>`: the publisher writes through it and every
/// subscriber creates its own [`QueueCursor`] from it.
pub struct Queue {
    pub(crate) state: Mutex<QueueState>,
    pub(crate) cond: Condvar,
    pub(crate) notify: Notify,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) labels: MetricLabels,
}

impl Queue {
    /// Create a new queue with default configuration
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create a new queue with custom configuration
    pub fn with_config(config: QueueConfig) -> Self {
        Self::with_metrics(config, Arc::new(NoopMetrics))
    }

    /// Create a new queue reporting into `metrics`
    pub fn with_metrics(config: QueueConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            state: Mutex::new(QueueState {
                buf: PacketBuf::with_capacity(config.initial_capacity),
                streams: None,
                video_idx: None,
                audio_idx: None,
                closed: false,
                jumped: false,
                max_gop_count: config.max_gop_count,
                first_packet_at: None,
                seen_keyframe: false,
            }),
            cond: Condvar::new(),
            notify: Notify::new(),
            metrics,
            labels: config.labels,
        }
    }

    /// Set the maximum GOP count
    ///
    /// Retention does not consult this value; a video key-frame always
    /// drains the buffer.
    pub fn set_max_gop_count(&self, n: usize) {
        self.state.lock().max_gop_count = n;
    }

    pub fn max_gop_count(&self) -> usize {
        self.state.lock().max_gop_count
    }

    /// Record the stream table and wake every waiter
    ///
    /// The first video and first audio streams become the canonical indices.
    pub fn write_header(&self, streams: Vec<CodecData>) {
        let video_idx = streams.iter().position(|s| s.is_video());
        let audio_idx = streams.iter().position(|s| s.is_audio());

        tracing::info!(
            who = %self.labels.who,
            streams = streams.len(),
            video_index = ?video_idx,
            audio_index = ?audio_idx,
            "Stream header written"
        );

        {
            let mut state = self.state.lock();
            state.streams = Some(streams);
            state.video_idx = video_idx;
            state.audio_idx = audio_idx;
        }
        self.wake();
    }

    /// Put a packet into the buffer
    ///
    /// A video key-frame first discards everything buffered. A sequence
    /// header is decoded before anything changes; when decoding fails the
    /// queue is left untouched and the packet is not enqueued.
    pub fn write_packet(&self, pkt: Packet) -> Result<()> {
        let codec = if pkt.is_seq_header {
            Some(self.decode_sequence_header(&pkt)?)
        } else {
            None
        };

        let now = Instant::now();
        {
            let mut state = self.state.lock();

            if pkt.is_video_keyframe() {
                let mut dropped = 0usize;
                let mut dropped_header = false;
                for slot in state.buf.drain() {
                    dropped += 1;
                    dropped_header |= slot.pkt.is_seq_header;
                }
                if dropped_header {
                    state.jumped = true;
                }
                if dropped > 0 {
                    tracing::debug!(
                        who = %self.labels.who,
                        dropped = dropped,
                        dropped_header = dropped_header,
                        "Key-frame drained buffer"
                    );
                }
            }

            if let Some(codec) = codec {
                let description = codec.describe();
                let index = state.update_stream(codec);
                tracing::info!(
                    who = %self.labels.who,
                    index = index,
                    codec = %description,
                    "Stream descriptor updated"
                );
            }

            self.report_write(&mut state, &pkt, now);
            state.buf.push(Slot::at(pkt, now));
        }
        self.wake();
        Ok(())
    }

    /// End of the writer lifecycle; nothing to flush
    pub fn write_trailer(&self) {}

    /// Close the queue
    ///
    /// Every cursor returns `EndOfStream` once it has read what is buffered.
    /// Statistics stay readable until the queue is dropped.
    pub fn close(&self) {
        let was_closed = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.closed, true)
        };
        if !was_closed {
            tracing::info!(who = %self.labels.who, "Queue closed");
        }
        self.wake();
    }

    /// Wait for the stream table
    ///
    /// Returns `EndOfStream` if the queue closes before any header arrives.
    pub fn streams(&self) -> Result<Vec<CodecData>> {
        let mut state = self.state.lock();
        loop {
            if let Some(streams) = Self::poll_streams(&state) {
                return streams;
            }
            self.cond.wait(&mut state);
        }
    }

    /// Async variant of [`Queue::streams`]
    pub async fn streams_async(&self) -> Result<Vec<CodecData>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let polled = {
                let state = self.state.lock();
                Self::poll_streams(&state)
            };
            if let Some(streams) = polled {
                return streams;
            }
            notified.await;
        }
    }

    fn poll_streams(state: &QueueState) -> Option<Result<Vec<CodecData>>> {
        match (&state.streams, state.closed) {
            (Some(streams), _) => Some(Ok(streams.clone())),
            (None, true) => Some(Err(QueueError::EndOfStream)),
            (None, false) => None,
        }
    }

    /// Cursor starting at the next packet written after its first read
    pub fn latest(self: &Arc<Self>) -> QueueCursor {
        self.cursor(CursorStart::Latest)
    }

    /// Cursor starting at the oldest buffered packet
    pub fn oldest(self: &Arc<Self>) -> QueueCursor {
        self.cursor(CursorStart::Oldest)
    }

    /// Cursor starting `delay` behind the newest buffered packet
    pub fn delayed_time(self: &Arc<Self>, delay: Duration) -> QueueCursor {
        self.cursor(CursorStart::DelayedTime(delay))
    }

    /// Cursor starting `n` video key-frames back from the newest packet
    pub fn delayed_gop_count(self: &Arc<Self>, n: usize) -> QueueCursor {
        self.cursor(CursorStart::DelayedGopCount(n))
    }

    /// Cursor with an explicit start policy
    pub fn cursor(self: &Arc<Self>, start: CursorStart) -> QueueCursor {
        QueueCursor::new(Arc::clone(self), start)
    }

    /// Number of buffered packets
    pub fn len(&self) -> usize {
        self.state.lock().buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().buf.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn head(&self) -> BufPos {
        self.state.lock().buf.head()
    }

    pub fn tail(&self) -> BufPos {
        self.state.lock().buf.tail()
    }

    /// Index of the canonical video stream
    pub fn video_index(&self) -> Option<usize> {
        self.state.lock().video_idx
    }

    /// Index of the canonical audio stream
    pub fn audio_index(&self) -> Option<usize> {
        self.state.lock().audio_idx
    }

    /// Copy of the buffered packets, oldest first
    pub fn snapshot(&self) -> Vec<Packet> {
        let state = self.state.lock();
        state.buf.iter().map(|(_, slot)| slot.pkt.clone()).collect()
    }

    fn decode_sequence_header(&self, pkt: &Packet) -> Result<CodecData> {
        let decoded = match pkt.kind {
            MediaKind::Video => decode_avc_config(pkt.data.clone()),
            MediaKind::Audio => decode_aac_config(pkt.data.clone()),
        };
        decoded.map_err(|source| {
            tracing::warn!(
                who = %self.labels.who,
                kind = %pkt.kind,
                error = %source,
                "Invalid sequence header, packet dropped"
            );
            QueueError::InvalidSequenceHeader {
                kind: pkt.kind,
                source,
            }
        })
    }

    fn report_write(&self, state: &mut QueueState, pkt: &Packet, now: Instant) {
        let labels = &self.labels;
        let bits = pkt.size() as u64 * 8;
        let first_packet_at = *state.first_packet_at.get_or_insert(now);

        self.metrics.add_counter(metrics::TOTAL_BITS, labels, bits);

        if pkt.is_seq_header {
            let name = match pkt.kind {
                MediaKind::Video => metrics::VIDEO_SEQ_HEADER,
                MediaKind::Audio => metrics::AUDIO_SEQ_HEADER,
            };
            self.metrics.increment_counter(name, labels);
            return;
        }

        if pkt.is_video() {
            self.metrics.increment_counter(metrics::FRAMES, labels);
            self.metrics.add_counter(metrics::BITS, labels, bits);
        }

        if pkt.is_video_keyframe() {
            self.metrics.increment_counter(metrics::KEYFRAME, labels);
            if !state.seen_keyframe {
                state.seen_keyframe = true;
                let waited = now.duration_since(first_packet_at);
                self.metrics.set_gauge(
                    metrics::FIRST_KEYFRAME,
                    labels,
                    pkt.time.as_millis() as f64,
                );
                self.metrics.set_gauge(
                    metrics::WAIT_FIRST_KEYFRAME,
                    labels,
                    waited.as_secs_f64() * 1000.0,
                );
            }
        }
    }

    fn wake(&self) {
        self.cond.notify_all();
        self.notify.notify_waiters();
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.metrics.clear(&self.labels);
    }
}
