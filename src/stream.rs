//! Producer and consumer traits
//!
//! Format demuxers feed a [`PacketWriter`]; muxers and network senders pull
//! from a [`PacketReader`]. The queue implements both sides, so either end
//! can be swapped for a real container without the other noticing.

use crate::error::Result;
use crate::media::{CodecData, Packet};
use crate::pubsub::{Queue, QueueCursor};

/// Sink for a packet stream
pub trait PacketWriter {
    fn write_header(&self, streams: Vec<CodecData>) -> Result<()>;

    fn write_packet(&self, pkt: Packet) -> Result<()>;

    fn write_trailer(&self) -> Result<()>;
}

/// Source of a packet stream
pub trait PacketReader {
    /// Stream table, available once the header is known
    fn streams(&mut self) -> Result<Vec<CodecData>>;

    /// Next packet, `EndOfStream` when the source is exhausted
    fn read_packet(&mut self) -> Result<Packet>;
}

impl PacketWriter for Queue {
    fn write_header(&self, streams: Vec<CodecData>) -> Result<()> {
        Queue::write_header(self, streams);
        Ok(())
    }

    fn write_packet(&self, pkt: Packet) -> Result<()> {
        Queue::write_packet(self, pkt)
    }

    fn write_trailer(&self) -> Result<()> {
        Queue::write_trailer(self);
        Ok(())
    }
}

impl PacketReader for QueueCursor {
    fn streams(&mut self) -> Result<Vec<CodecData>> {
        QueueCursor::streams(self)
    }

    fn read_packet(&mut self) -> Result<Packet> {
        QueueCursor::read_packet(self)
    }
}

/// Copy every packet from `reader` into `writer`
///
/// Writes the header first and the trailer once the reader reports
/// `EndOfStream`. Returns the number of packets copied.
pub fn copy_packets<R, W>(reader: &mut R, writer: &W) -> Result<u64>
where
    R: PacketReader + ?Sized,
    W: PacketWriter + ?Sized,
{
    writer.write_header(reader.streams()?)?;

    let mut copied = 0;
    loop {
        match reader.read_packet() {
            Ok(pkt) => {
                writer.write_packet(pkt)?;
                copied += 1;
            }
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err),
        }
    }

    writer.write_trailer()?;
    Ok(copied)
}
