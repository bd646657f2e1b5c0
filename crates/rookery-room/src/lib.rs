//! Client-side world model for Rookery.
//!
//! A read-only mirror of server state, updated by built-in handlers as
//! notifications arrive:
//!
//! - [`Lobby`] owns every known [`Room`] and the self [`User`].
//! - [`Room`] holds its members keyed by session id.
//! - [`User`] is one player's status and seat.
//!
//! Each type knows how to decode itself from a [`PacketReader`]; the
//! [`Lobby`] `apply_*` methods take decoded values so the mutation rules
//! can be exercised without building frames.
//!
//! [`PacketReader`]: rookery_protocol::PacketReader

mod config;
mod lobby;
mod room;
mod user;

pub use config::{RoomStatus, RoomType, UserStatus};
pub use lobby::{LastEvent, Lobby};
pub use room::Room;
pub use user::User;
