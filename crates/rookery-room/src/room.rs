//! Rooms as the client sees them.
//!
//! A `Room` is a snapshot pushed by the server plus whatever incremental
//! updates arrived since. It never talks to the lobby that owns it: the
//! [`Lobby`](crate::Lobby) looks rooms up by id and records cross-room
//! effects itself, so there is exactly one owner and no back-reference.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rookery_protocol::{PacketReader, ProtocolError, RoomId, SessionId};

use crate::{RoomStatus, RoomType, User};

/// Marks the end of the member list in a room snapshot.
const MEMBER_LIST_END: (u16, u16) = (0xffff, 0xffff);

/// One room and its current members.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    kind: RoomType,
    status: RoomStatus,
    capacity: u16,
    owner: SessionId,
    pub(crate) created_at: Instant,
    members: BTreeMap<SessionId, User>,
}

impl Room {
    pub fn new(id: RoomId, kind: RoomType, capacity: u16, owner: SessionId) -> Self {
        Self {
            id,
            kind,
            status: RoomStatus::Open,
            capacity,
            owner,
            created_at: Instant::now(),
            members: BTreeMap::new(),
        }
    }

    /// Reads a room snapshot:
    ///
    /// ```text
    ///   [room_id:u16][type:u8][capacity:u16][owner:u16]
    ///   ([session_id:u16][room_index:u16])*  [0xffff][0xffff]
    /// ```
    ///
    /// A payload that ends right after a member pair is accepted as if the
    /// terminator were present.
    pub fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let id = RoomId(reader.read()?);
        let kind = RoomType::try_from(reader.read::<u8>()?)?;
        let capacity = reader.read()?;
        let owner = SessionId(reader.read()?);
        let mut room = Self::new(id, kind, capacity, owner);

        while !reader.is_empty() {
            let pair = (reader.read::<u16>()?, reader.read::<u16>()?);
            if pair == MEMBER_LIST_END {
                break;
            }
            let (session, index) = pair;
            room.insert(User::in_room(SessionId(session), id, index));
        }
        Ok(room)
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn kind(&self) -> RoomType {
        self.kind
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn is_locked(&self) -> bool {
        self.status == RoomStatus::Locked
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn owner(&self) -> SessionId {
        self.owner
    }

    /// When this client first learned about the room.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn member(&self, session_id: SessionId) -> Option<&User> {
        self.members.get(&session_id)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains_key(&session_id)
    }

    /// Members in session-id order.
    pub fn members(&self) -> impl Iterator<Item = &User> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= usize::from(self.capacity)
    }

    /// Adds or replaces a member, forcing it InRoom here.
    pub(crate) fn insert(&mut self, mut user: User) -> &User {
        user.status = crate::UserStatus::InRoom;
        user.room_id = self.id;
        let session = user.session_id;
        self.members.insert(session, user);
        &self.members[&session]
    }

    /// Removes a member, returning it moved back to the lobby.
    pub(crate) fn remove(&mut self, session_id: SessionId) -> Option<User> {
        let mut user = self.members.remove(&session_id)?;
        user.leave_room();
        Some(user)
    }

    pub(crate) fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
    }

    pub(crate) fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.keys().copied()
    }
}
