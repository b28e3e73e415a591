//! Packet storage primitives

pub mod buf;

pub use buf::{BufPos, PacketBuf};
