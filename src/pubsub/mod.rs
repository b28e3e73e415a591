//! Publisher/subscriber packet fan-out
//!
//! One producer writes packets into a [`Queue`]; every subscriber reads
//! them through its own [`QueueCursor`].
//!
//! # Architecture
//!
//! ```text
//!     [Demuxer]                          Arc<Queue>
//!   write_header() ──►  ┌─────────────────────────────────┐
//!   write_packet() ──►  │ Mutex<QueueState> {             │
//!   close()        ──►  │   buf: PacketBuf<Slot>,         │
//!                       │   streams, video_idx, audio_idx,│
//!                       │   closed, jumped                │
//!                       │ }                               │
//!                       │ Condvar + Notify (broadcast)    │
//!                       └───────────────┬─────────────────┘
//!                                       │
//!         ┌─────────────────────────────┼─────────────────────────────┐
//!         ▼                             ▼                             ▼
//!   QueueCursor(Oldest)       QueueCursor(Latest)       QueueCursor(DelayedGopCount)
//!   read_packet()             recv().await              read_packet()
//! ```
//!
//! # Retention
//!
//! A video key-frame empties the buffer before it is stored, so the buffer
//! only ever holds the GOP in progress. Cursors that fall behind are moved
//! forward to the new head on their next read.
//!
//! # Discontinuity
//!
//! When a drain discards a sequence header the queue raises a single shared
//! flag. The first cursor that is moved forward over a gap while the flag is
//! up gets its packet marked `jumped` and lowers the flag. Which cursor
//! observes it is not deterministic and other cursors that crossed the same
//! gap are not told.

pub mod config;
pub mod cursor;
pub mod queue;

pub use config::QueueConfig;
pub use cursor::{CursorStart, QueueCursor};
pub use queue::Queue;
