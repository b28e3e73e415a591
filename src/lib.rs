//! Live media packet fan-out
//!
//! A single publisher writes timestamped media packets into a [`Queue`];
//! any number of subscribers read them concurrently through independent
//! [`QueueCursor`]s, each starting at its own offset. Memory stays bounded
//! because every video key-frame discards what came before it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use live_pubsub::{Packet, Queue};
//!
//! let queue = Arc::new(Queue::new());
//! let mut cursor = queue.oldest();
//!
//! queue
//!     .write_packet(Packet::video(Duration::ZERO, Bytes::from_static(b"idr"), true))
//!     .unwrap();
//! queue.close();
//!
//! while let Ok(pkt) = cursor.read_packet() {
//!     println!("{:?} {} bytes", pkt.time, pkt.size());
//! }
//! ```

pub mod error;
pub mod media;
pub mod pktque;
pub mod pubsub;
pub mod stats;
pub mod stream;

pub use error::{MediaError, QueueError, Result};
pub use media::{CodecData, CodecType, MediaKind, Packet};
pub use pubsub::{CursorStart, Queue, QueueConfig, QueueCursor};
pub use stats::{MemoryMetrics, MetricLabels, MetricsSink, NoopMetrics};
pub use stream::{copy_packets, PacketReader, PacketWriter};
