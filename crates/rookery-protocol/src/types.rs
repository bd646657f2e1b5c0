//! Identifiers, frame kinds, destinations, and well-known event codes.
//!
//! Everything here is a plain value type. The numeric values are fixed by
//! the server and must not be renumbered.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Server-assigned id of one connected session (one player).
///
/// The server hands this out in the Established frame. `#[serde(transparent)]`
/// serializes it as a bare number instead of `{"0": 5}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u16);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", self.0)
    }
}

/// Server-assigned id of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u16);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FrameKind
// ---------------------------------------------------------------------------

/// The frame kind carried in the low nibble of every frame header.
///
/// The high nibble is reserved for flags and is ignored when classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Liveness probe. Carries nothing; also used as the heartbeat header.
    Hello = 0,
    /// The peer is closing the session.
    Closing = 1,
    /// The session is closed.
    Closed = 2,
    /// Followed by keep-alive seconds and the session id.
    Established = 3,
    /// Client → server only: `[len:u16][token]`.
    Authenticate = 4,
    /// Clock sample: 16 bytes, the last 8 are a tick timestamp.
    Ntp = 5,
    /// Reserved.
    Proxy = 6,
    /// Length-prefixed payload produced by the engine itself.
    Builtin = 8,
    /// Length-prefixed payload defined by the application.
    Original = 9,
}

impl FrameKind {
    /// Classifies a header byte by its low nibble.
    pub fn from_header(header: u8) -> Option<Self> {
        match header & 0x0f {
            0 => Some(Self::Hello),
            1 => Some(Self::Closing),
            2 => Some(Self::Closed),
            3 => Some(Self::Established),
            4 => Some(Self::Authenticate),
            5 => Some(Self::Ntp),
            6 => Some(Self::Proxy),
            8 => Some(Self::Builtin),
            9 => Some(Self::Original),
            _ => None,
        }
    }

    /// The bare header byte for this kind (flags nibble zero).
    pub fn header(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Who a user-defined message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DestinationKind {
    /// Echo back to the sender.
    Myself = 0,
    /// One specific session, named by the destination id.
    Specified = 1,
    /// Everyone in the sender's room.
    Room = 2,
    /// Everyone in the lobby.
    Lobby = 3,
}

impl TryFrom<u8> for DestinationKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Myself),
            1 => Ok(Self::Specified),
            2 => Ok(Self::Room),
            3 => Ok(Self::Lobby),
            other => Err(ProtocolError::InvalidMessage(format!(
                "unknown destination kind {other}"
            ))),
        }
    }
}

/// A destination kind plus its 16-bit id.
///
/// For every kind except [`DestinationKind::Specified`] the id is
/// conventionally `0xffff` ("whatever is implied by the kind").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub kind: DestinationKind,
    pub id: u16,
}

impl Destination {
    /// Placeholder id used when the kind alone identifies the target.
    pub const IMPLIED: u16 = 0xffff;

    pub fn myself() -> Self {
        Self {
            kind: DestinationKind::Myself,
            id: Self::IMPLIED,
        }
    }

    pub fn session(id: SessionId) -> Self {
        Self {
            kind: DestinationKind::Specified,
            id: id.0,
        }
    }

    pub fn room() -> Self {
        Self {
            kind: DestinationKind::Room,
            id: Self::IMPLIED,
        }
    }

    pub fn lobby() -> Self {
        Self {
            kind: DestinationKind::Lobby,
            id: Self::IMPLIED,
        }
    }
}

/// Messages go to the sender's room unless told otherwise.
impl Default for Destination {
    fn default() -> Self {
        Self::room()
    }
}

// ---------------------------------------------------------------------------
// Event codes
// ---------------------------------------------------------------------------

/// Well-known 16-bit event codes.
///
/// `0x0000..=0x7fff` are client requests and `0x8000..=0xffff` are server
/// notifications. Whether a frame is "built-in" is decided by its header,
/// not by the code.
pub mod event {
    pub const USER_VALUE: u16 = 0x00fe;
    pub const USER_MESSAGE: u16 = 0x00ff;
    pub const ROOM_CREATE: u16 = 0x0100;
    pub const ROOM_ENTER: u16 = 0x0101;
    pub const ROOM_EXIT: u16 = 0x0102;
    pub const ROOM_LOCK: u16 = 0x0103;
    pub const ROOM_UNLOCK: u16 = 0x0104;
    pub const ROOM_MATCH: u16 = 0x0110;
    pub const ROOM_BROADCAST: u16 = 0x01ff;

    pub const ON_USER_UPDATED: u16 = 0x8000;
    pub const ON_USER_EMOJI: u16 = 0x8001;
    pub const ON_USER_ENTERED_ROOM: u16 = 0x8002;
    pub const ON_USER_EXITED_ROOM: u16 = 0x8003;
    pub const ON_USER_VALUE: u16 = 0x80fe;
    pub const ON_USER_MESSAGE: u16 = 0x80ff;
    pub const ON_ROOM_CREATED: u16 = 0x8100;
    pub const ON_ROOM_UPDATED: u16 = 0x8101;
    pub const ON_ROOM_REMOVED: u16 = 0x8102;
    pub const ON_ROOM_LOCKED: u16 = 0x8103;
    pub const ON_ROOM_UNLOCKED: u16 = 0x8104;
    pub const ON_ROOM_USER_MESSAGE: u16 = 0x81ff;
    pub const ON_ERROR_SERVER: u16 = 0x8ffe;
    pub const ON_ERROR_CLIENT: u16 = 0x8fff;

    /// True for server → client notification codes.
    pub fn is_notification(code: u16) -> bool {
        code & 0x8000 != 0
    }

    /// A short name for well-known codes, for log output.
    pub fn name(code: u16) -> Option<&'static str> {
        Some(match code {
            USER_VALUE => "user_value",
            USER_MESSAGE => "user_message",
            ROOM_CREATE => "room_create",
            ROOM_ENTER => "room_enter",
            ROOM_EXIT => "room_exit",
            ROOM_LOCK => "room_lock",
            ROOM_UNLOCK => "room_unlock",
            ROOM_MATCH => "room_match",
            ROOM_BROADCAST => "room_broadcast",
            ON_USER_UPDATED => "on_user_updated",
            ON_USER_EMOJI => "on_user_emoji",
            ON_USER_ENTERED_ROOM => "on_user_entered_room",
            ON_USER_EXITED_ROOM => "on_user_exited_room",
            ON_USER_VALUE => "on_user_value",
            ON_USER_MESSAGE => "on_user_message",
            ON_ROOM_CREATED => "on_room_created",
            ON_ROOM_UPDATED => "on_room_updated",
            ON_ROOM_REMOVED => "on_room_removed",
            ON_ROOM_LOCKED => "on_room_locked",
            ON_ROOM_UNLOCKED => "on_room_unlocked",
            ON_ROOM_USER_MESSAGE => "on_room_user_message",
            ON_ERROR_SERVER => "on_error_server",
            ON_ERROR_CLIENT => "on_error_client",
            _ => return None,
        })
    }
}

/// Well-known application error codes carried by error notifications.
pub mod error_code {
    /// Client error: the request was malformed.
    pub const BAD_REQUEST: u16 = 0x0000;
    /// Server error: something failed on the server side.
    pub const INTERNAL: u16 = 0xffff;
}
