//! Room and user status enums, with their wire discriminants.

use std::fmt;

use rookery_protocol::ProtocolError;
use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    (
        $name:ident,
        $what:literal,
        { $($variant:ident = $value:literal => $label:literal),* $(,)? }
    ) => {
        impl TryFrom<u8> for $name {
            type Error = ProtocolError;

            fn try_from(value: u8) -> Result<Self, ProtocolError> {
                match value {
                    $($value => Ok(Self::$variant),)*
                    other => Err(ProtocolError::InvalidMessage(format!(
                        concat!("unknown ", $what, " {}"),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $label),)*
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UserStatus
// ---------------------------------------------------------------------------

/// Where a user currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum UserStatus {
    #[default]
    InLobby = 0,
    InRoom = 1,
}

wire_enum!(UserStatus, "user status", {
    InLobby = 0 => "in lobby",
    InRoom = 1 => "in room",
});

// ---------------------------------------------------------------------------
// RoomType
// ---------------------------------------------------------------------------

/// How a room came to exist.
///
/// - **Normal**: created explicitly by a player.
/// - **Match**: created by the server's matchmaking for a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoomType {
    #[default]
    Normal = 0,
    Match = 1,
}

wire_enum!(RoomType, "room type", {
    Normal = 0 => "normal",
    Match = 1 => "match",
});

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Whether a room accepts new members.
///
/// ```text
///   Open ──(lock)──→ Locked ──(unlock)──→ Open
/// ```
///
/// Every room starts Open, whatever its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoomStatus {
    #[default]
    Open = 0,
    Locked = 1,
}

wire_enum!(RoomStatus, "room status", {
    Open = 0 => "open",
    Locked = 1 => "locked",
});
