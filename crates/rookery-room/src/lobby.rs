//! The lobby: every room this client knows about, plus the self user.
//!
//! # Ownership
//!
//! The lobby is the single owner of all room state. Rooms are addressed by
//! [`RoomId`] and never refer back to the lobby. Cross-room bookkeeping
//! (moving a user out of one room and into another) happens here, driven
//! by a session → room index so a user can be found without scanning
//! every room.
//!
//! # Last event
//!
//! Every mutation records what it touched in [`LastEvent`]. The record is
//! cleared by [`Lobby::begin_event`] at the start of each dispatched frame,
//! so it only describes the frame currently being handled.

use std::collections::{BTreeMap, HashMap};

use rookery_protocol::{RoomId, SessionId};

use crate::{Room, RoomStatus, User};

/// What the frame currently being handled changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastEvent {
    pub event_code: Option<u16>,
    pub created_room: Option<RoomId>,
    pub updated_room: Option<RoomId>,
    pub removed_room: Option<RoomId>,
    pub entered_room: Option<RoomId>,
    pub exited_room: Option<RoomId>,
    pub locked_room: Option<RoomId>,
    pub unlocked_room: Option<RoomId>,
    pub entered_user: Option<User>,
    pub exited_user: Option<User>,
    /// The user the event was about, for events that concern one user.
    pub triggered_user: Option<User>,
}

#[derive(Debug, Default)]
pub struct Lobby {
    rooms: BTreeMap<RoomId, Room>,
    memberships: HashMap<SessionId, RoomId>,
    /// `None` until the server assigns this client a session.
    self_session: Option<SessionId>,
    self_user: User,
    last: LastEvent,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// Rooms in id order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn self_user(&self) -> &User {
        &self.self_user
    }

    /// The session id the server assigned, once it has.
    pub fn self_session(&self) -> Option<SessionId> {
        self.self_session
    }

    fn is_self(&self, session_id: SessionId) -> bool {
        self.self_session == Some(session_id)
    }

    pub fn last_event(&self) -> &LastEvent {
        &self.last
    }

    /// The room a session is currently a member of.
    pub fn room_of(&self, session_id: SessionId) -> Option<RoomId> {
        self.memberships.get(&session_id).copied()
    }

    /// Looks a user up through the membership index.
    pub fn user(&self, session_id: SessionId) -> Option<&User> {
        let room = self.room_of(session_id)?;
        self.rooms.get(&room)?.member(session_id)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Clears the last-event record and stamps it with `event_code`.
    pub fn begin_event(&mut self, event_code: u16) {
        self.last = LastEvent {
            event_code: Some(event_code),
            ..LastEvent::default()
        };
    }

    /// Assigns the session id the server gave this client. If that session
    /// is already seated in a known room, the self user picks up the seat.
    pub fn set_self_session(&mut self, session_id: SessionId) {
        self.self_session = Some(session_id);
        match self.user(session_id).cloned() {
            Some(member) => self.self_user = member,
            None => self.self_user = User::in_lobby(session_id),
        }
    }

    /// A user's state changed.
    ///
    /// The self user is replaced wholesale. Anyone else is patched into the
    /// room they report being in, if this client knows that room; lobby
    /// users are not tracked. Before the session is established no user
    /// counts as self.
    pub fn apply_user_updated(&mut self, user: User) {
        self.last.triggered_user = Some(user.clone());
        if self.is_self(user.session_id) {
            self.self_user = user;
            return;
        }
        if user.is_in_room() && self.rooms.contains_key(&user.room_id) {
            self.place(user);
        }
    }

    /// A user entered a room, leaving whatever room they were in before.
    pub fn apply_user_entered(&mut self, user: User) {
        let session = user.session_id;
        let target = user.room_id;

        if let Some(prior) = self.room_of(session) {
            if prior != target {
                self.evict(session, prior);
            }
        }

        let entered = if self.rooms.contains_key(&target) {
            self.last.entered_room = Some(target);
            Some(self.place(user))
        } else {
            tracing::debug!(%session, room = %target, "entered unknown room");
            self.memberships.remove(&session);
            None
        };

        if self.is_self(session) {
            self.self_user.status = crate::UserStatus::InRoom;
            self.self_user.room_id = target;
            if let Some(entered) = &entered {
                self.self_user.room_index = entered.room_index;
            }
        }

        self.last.entered_user = entered;
        self.last.triggered_user = self.last.entered_user.clone();
    }

    /// A user left `room`. Other rooms are not touched.
    pub fn apply_user_exited(&mut self, session_id: SessionId, room: RoomId) {
        let exited = self
            .evict(session_id, room)
            .unwrap_or_else(|| User::in_lobby(session_id));

        if self.is_self(session_id) && self.self_user.room_id == room {
            self.self_user.leave_room();
        }

        self.last.exited_room = Some(room);
        self.last.exited_user = Some(exited);
        self.last.triggered_user = self.last.exited_user.clone();
    }

    /// A new room appeared.
    pub fn apply_room_created(&mut self, room: Room) {
        self.last.created_room = Some(room.id());
        self.upsert(room);
    }

    /// A known room changed. Unknown rooms are inserted.
    pub fn apply_room_updated(&mut self, room: Room) {
        self.last.updated_room = Some(room.id());
        self.upsert(room);
    }

    /// Returns whether the room was known.
    pub fn apply_room_removed(&mut self, id: RoomId) -> bool {
        self.last.removed_room = Some(id);
        let Some(room) = self.rooms.remove(&id) else {
            return false;
        };
        for session in room.session_ids() {
            self.memberships.remove(&session);
        }
        if self.self_user.room_id == id && self.self_user.is_in_room() {
            self.self_user.leave_room();
        }
        tracing::debug!(room = %id, "room removed");
        true
    }

    /// Returns whether the room was known.
    pub fn apply_room_locked(&mut self, id: RoomId) -> bool {
        self.last.locked_room = Some(id);
        self.set_status(id, RoomStatus::Locked)
    }

    /// Returns whether the room was known.
    pub fn apply_room_unlocked(&mut self, id: RoomId) -> bool {
        self.last.unlocked_room = Some(id);
        self.set_status(id, RoomStatus::Open)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn set_status(&mut self, id: RoomId, status: RoomStatus) -> bool {
        match self.rooms.get_mut(&id) {
            Some(room) => {
                room.set_status(status);
                tracing::debug!(room = %id, %status, "room status changed");
                true
            }
            None => false,
        }
    }

    /// Inserts `user` into the room it names, which must exist, moving it
    /// out of any other room first.
    fn place(&mut self, user: User) -> User {
        let session = user.session_id;
        let target = user.room_id;
        if let Some(prior) = self.room_of(session) {
            if prior != target {
                self.evict(session, prior);
            }
        }
        let Some(room) = self.rooms.get_mut(&target) else {
            return user;
        };
        let placed = room.insert(user).clone();
        self.memberships.insert(session, target);
        placed
    }

    /// Removes `session` from `room` and drops its index entry if it
    /// pointed there.
    fn evict(&mut self, session: SessionId, room: RoomId) -> Option<User> {
        if self.memberships.get(&session) == Some(&room) {
            self.memberships.remove(&session);
        }
        self.rooms.get_mut(&room)?.remove(session)
    }

    /// Replaces a room snapshot, keeping the original `created_at` and
    /// moving any listed member out of the room they were indexed under.
    fn upsert(&mut self, mut room: Room) {
        let id = room.id();

        if let Some(old) = self.rooms.remove(&id) {
            room.created_at = old.created_at;
            for session in old.session_ids() {
                if !room.contains(session) {
                    self.memberships.remove(&session);
                }
            }
        }

        for session in room.session_ids() {
            if let Some(prior) = self.room_of(session) {
                if prior != id {
                    self.evict(session, prior);
                }
            }
            self.memberships.insert(session, id);
        }

        if let Some(member) = self.self_session.and_then(|own| room.member(own)) {
            self.self_user = member.clone();
        } else if self.self_user.room_id == id && self.self_user.is_in_room() {
            self.self_user.leave_room();
        }

        tracing::debug!(room = %id, members = room.member_count(), "room upserted");
        self.rooms.insert(id, room);
    }
}
