//! astra-protocol -- the packed binary wire protocol of the astra server.
//!
//! Every packet is an 8-byte [`packet::PacketHeader`] followed by one
//! fixed-size payload (variable-length payloads are a fixed header plus a
//! count-sized array of fixed-size records). Integers travel big-endian;
//! `f32` fields are written explicitly as IEEE-754 little-endian byte
//! strings, so the codec has no platform-endianness assumptions at all.
//!
//! Payload layouts are frozen: each type carries a `WIRE_SIZE` constant and
//! the test suite asserts the encoded length byte for byte. Changing a layout
//! is a protocol version bump, not a refactor.

pub mod packet;
pub mod payload;

pub use packet::{
    DestroyReason, DisconnectReason, EntityType, PacketHeader, PacketType, RejectReason,
    HEADER_SIZE, MAGIC_HI, MAGIC_LO,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while decoding wire data. Encoding is infallible.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer is shorter than the fixed layout requires.
    #[error("truncated buffer: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },

    /// The two magic bytes did not match.
    #[error("bad magic bytes {0:#04x} {1:#04x}")]
    BadMagic(u8, u8),

    /// The header's packet type byte is not a known [`PacketType`].
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),

    /// An entity type byte is not a known [`EntityType`].
    #[error("unknown entity type {0:#04x}")]
    UnknownEntityType(u8),

    /// A reason code byte is outside its enum's range.
    #[error("unknown reason code {0:#04x}")]
    UnknownReason(u8),

    /// The header's payload length disagrees with the bytes that follow it.
    #[error("payload length mismatch: header says {header}, buffer has {actual}")]
    LengthMismatch { header: usize, actual: usize },
}
