//! # Rookery
//!
//! Client engine for realtime multiplayer sessions.
//!
//! Rookery keeps one session with a realtime server alive, rebuilds the
//! server's binary frames from whatever the transport delivers, routes
//! them through prefix-scoped middleware to your handlers, and keeps a
//! local mirror of the lobby, its rooms, and their users.
//!
//! Everything is poll-driven: nothing happens between calls to
//! [`Client::tick`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rookery::prelude::*;
//!
//! let credential = Credential::parse(&std::env::var("ROOKERY_CREDENTIAL").unwrap_or_default());
//! let discovery = StaticDiscovery::new(ServerDescriptor::new("127.0.0.1", 7000));
//! let mut client = Client::new(credential, TcpTransport::new(), discovery);
//!
//! client.register_handler(event::ON_ROOM_CREATED, |frame: &Frame| {
//!     println!("room created: {} body bytes", frame.body().len());
//!     Ok(())
//! })?;
//! client.start()?;
//! loop {
//!     client.tick()?;
//!     # break;
//! }
//! client.stop()?;
//! # Ok::<(), RookeryError>(())
//! ```

mod builtin;
mod client;
mod error;

pub use builtin::{ErrorReport, ErrorSource, UserMessage};
pub use client::{Client, ClientBuilder};
pub use error::RookeryError;

pub use rookery_dispatch as dispatch;
pub use rookery_protocol as protocol;
pub use rookery_room as room;
pub use rookery_session as session;
pub use rookery_transport as transport;

/// The types most applications need.
pub mod prelude {
    pub use crate::{Client, ClientBuilder, ErrorReport, ErrorSource, RookeryError, UserMessage};
    pub use rookery_dispatch::{DispatchError, Handler, HandlerResult, Middleware};
    pub use rookery_protocol::{
        Destination, DestinationKind, Frame, GamePacket, Packet, PacketReader, RoomId, SessionId,
        error_code, event,
    };
    pub use rookery_room::{LastEvent, Lobby, Room, RoomStatus, RoomType, User, UserStatus};
    pub use rookery_session::{
        ClientConfig, Credential, Discovery, Phase, ServerDescriptor, StaticDiscovery,
    };
    pub use rookery_transport::{MemoryTransport, TcpTransport, Transport};
}
