//! Wire protocol for Rookery.
//!
//! This crate defines the bytes that travel between client and server:
//!
//! - **Codec** ([`Packet`], [`GamePacket`], [`PacketReader`]): the typed,
//!   big-endian, cursor-based encoding of message bodies.
//! - **Frames** ([`FrameAssembler`], [`Frame`], [`FrameEvent`]): the state
//!   machine that rebuilds whole frames from a fragmented byte stream,
//!   plus the fixed control frames (authenticate, heartbeat, closing).
//! - **Types** ([`SessionId`], [`RoomId`], [`FrameKind`], [`Destination`],
//!   [`event`] codes): the vocabulary shared by every other crate.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → FrameAssembler (Frame) → Dispatch (handlers)
//!                                                  ↓
//!                                   PacketReader (typed values)
//! ```
//!
//! Nothing here knows about sockets or handlers: bytes go in, frames and
//! values come out.

mod codec;
mod error;
mod frame;
mod types;

pub use codec::{
    DEFAULT_HEADER, GamePacket, HEADER_RESERVED, PACKET_CAPACITY, Packet, PacketReader,
    WireDecode, WireEncode, from_ticks, to_ticks,
};
pub use error::ProtocolError;
pub use frame::{
    ByteSource, Frame, FrameAssembler, FrameEvent, authenticate_frame, closing_frame,
    heartbeat_frame,
};
pub use types::{Destination, DestinationKind, FrameKind, RoomId, SessionId, error_code, event};
