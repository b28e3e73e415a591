//! Live fan-out demo
//!
//! Run with: cargo run --example fanout [SECONDS]
//!
//! A publisher thread writes a synthetic 25fps H.264 + AAC stream with a
//! key-frame every second. Four async subscribers read it, one per cursor
//! start policy, and print what they received when the stream ends.
//!
//! Set `RUST_LOG=live_pubsub=debug` to watch key-frame drains and cursor
//! snaps.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use live_pubsub::media::{decode_aac_config, decode_avc_config};
use live_pubsub::stats::metrics;
use live_pubsub::{CursorStart, MemoryMetrics, MetricLabels, Packet, Queue, QueueConfig};

const AVC_RECORD: &[u8] = &[
    0x01, 0x64, 0x00, 0x1F, 0xFF, 0xE1, 0x00, 0x04, 0x67, 0x64, 0x00, 0x1F, 0x01, 0x00, 0x03, 0x68,
    0xEF, 0x38,
];
const AAC_RECORD: &[u8] = &[0x12, 0x10];

const FRAME_INTERVAL: Duration = Duration::from_millis(40);
const GOP_FRAMES: u64 = 25;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn publish(queue: Arc<Queue>, seconds: u64) -> Result<(), BoxError> {
    queue.write_header(vec![
        decode_avc_config(Bytes::from_static(AVC_RECORD))?,
        decode_aac_config(Bytes::from_static(AAC_RECORD))?,
    ]);

    queue.write_packet(
        Packet::video(Duration::ZERO, Bytes::from_static(AVC_RECORD), true).sequence_header(),
    )?;
    queue.write_packet(
        Packet::audio(Duration::ZERO, Bytes::from_static(AAC_RECORD))
            .with_index(1)
            .sequence_header(),
    )?;

    for frame in 0..seconds * GOP_FRAMES {
        if queue.is_closed() {
            break;
        }
        let time = FRAME_INTERVAL * frame as u32;
        let keyframe = frame % GOP_FRAMES == 0;
        let size = if keyframe { 20_000 } else { 3_000 };

        queue.write_packet(Packet::video(time, Bytes::from(vec![0u8; size]), keyframe))?;
        queue.write_packet(Packet::audio(time, Bytes::from(vec![0u8; 256])).with_index(1))?;

        thread::sleep(FRAME_INTERVAL);
    }

    queue.write_trailer();
    queue.close();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let seconds = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 5,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("live_pubsub=info".parse()?),
        )
        .init();

    let sink = Arc::new(MemoryMetrics::new());
    let labels = MetricLabels::new("live/demo", "publish");
    let queue = Arc::new(Queue::with_metrics(
        QueueConfig::default().labels(labels.clone()),
        sink.clone(),
    ));

    let starts = [
        CursorStart::Latest,
        CursorStart::Oldest,
        CursorStart::DelayedTime(Duration::from_millis(500)),
        CursorStart::DelayedGopCount(1),
    ];

    let mut subscribers = Vec::new();
    for (i, start) in starts.into_iter().enumerate() {
        let mut cursor = queue
            .cursor(start)
            .with_labels(MetricLabels::new(format!("viewer-{}", i), "subscribe"));
        subscribers.push(tokio::spawn(async move {
            // Stagger joins so each policy sees a different backlog
            tokio::time::sleep(Duration::from_millis(300 * i as u64)).await;

            let streams = cursor.streams_async().await?;
            let (mut packets, mut keyframes, mut jumps) = (0u64, 0u64, 0u64);
            while let Ok(pkt) = cursor.recv().await {
                packets += 1;
                keyframes += pkt.is_video_keyframe() as u64;
                jumps += pkt.jumped as u64;
            }
            println!(
                "{:?}: {} streams, {} packets, {} key-frames, {} jumps",
                start,
                streams.len(),
                packets,
                keyframes,
                jumps
            );
            Ok::<_, live_pubsub::QueueError>(())
        }));
    }

    let publisher = {
        let queue = Arc::clone(&queue);
        tokio::task::spawn_blocking(move || publish(queue, seconds))
    };

    tokio::select! {
        result = publisher => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
            queue.close();
        }
    }

    for subscriber in subscribers {
        subscriber.await??;
    }

    println!(
        "Published: frames={} keyframes={} totalbits={}",
        sink.counter(metrics::FRAMES, &labels),
        sink.counter(metrics::KEYFRAME, &labels),
        sink.counter(metrics::TOTAL_BITS, &labels),
    );

    Ok(())
}
