//! Users as the client sees them.

use rookery_protocol::{PacketReader, ProtocolError, RoomId, SessionId};
use serde::{Deserialize, Serialize};

use crate::UserStatus;

/// One connected player.
///
/// `room_id` and `room_index` are only meaningful while `status` is
/// `InRoom`; in the lobby both are zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub session_id: SessionId,
    pub status: UserStatus,
    pub room_id: RoomId,
    /// Seat position inside the room.
    pub room_index: u16,
}

impl User {
    pub fn in_lobby(session_id: SessionId) -> Self {
        Self {
            session_id,
            ..Default::default()
        }
    }

    pub fn in_room(session_id: SessionId, room_id: RoomId, room_index: u16) -> Self {
        Self {
            session_id,
            status: UserStatus::InRoom,
            room_id,
            room_index,
        }
    }

    pub fn is_in_room(&self) -> bool {
        self.status == UserStatus::InRoom
    }

    /// `[session_id:u16][status:u8]`, then `[room_id:u16][room_index:u16]`
    /// only when the status is InRoom.
    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let session_id = SessionId(reader.read()?);
        let status = UserStatus::try_from(reader.read::<u8>()?)?;
        match status {
            UserStatus::InRoom => {
                let room_id = RoomId(reader.read()?);
                let room_index = reader.read()?;
                Ok(Self::in_room(session_id, room_id, room_index))
            }
            UserStatus::InLobby => Ok(Self::in_lobby(session_id)),
        }
    }

    /// Moves the user back to the lobby.
    pub(crate) fn leave_room(&mut self) {
        self.status = UserStatus::InLobby;
        self.room_id = RoomId(0);
        self.room_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_in_room_user_reads_room_fields() {
        let bytes = [0x00, 0x2a, 0x01, 0x00, 0x05, 0x00, 0x02];
        let mut r = PacketReader::new(&bytes);
        let user = User::decode(&mut r).unwrap();
        assert_eq!(user, User::in_room(SessionId(42), RoomId(5), 2));
        assert!(r.is_empty());
    }

    #[test]
    fn test_decode_lobby_user_stops_after_status() {
        let bytes = [0x00, 0x07, 0x00, 0xff];
        let mut r = PacketReader::new(&bytes);
        let user = User::decode(&mut r).unwrap();
        assert_eq!(user, User::in_lobby(SessionId(7)));
        assert_eq!(r.remaining(), 1);
    }

    #[test]
    fn test_decode_bad_status_is_error() {
        let mut r = PacketReader::new(&[0x00, 0x01, 0x09]);
        assert!(User::decode(&mut r).is_err());
    }

    #[test]
    fn test_decode_truncated_room_fields_is_error() {
        let mut r = PacketReader::new(&[0x00, 0x01, 0x01, 0x00]);
        assert!(matches!(
            User::decode(&mut r),
            Err(ProtocolError::Truncated { .. })
        ));
    }
}
