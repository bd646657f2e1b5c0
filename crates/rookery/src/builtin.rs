//! Built-in handlers: the engine's own reactions to server notifications.
//!
//! Installed into the controller's builtin table when the client starts.
//! They keep the [`Lobby`] mirror current and forward decoded application
//! errors and user messages to the client's fan-out routes:
//!
//! ```text
//!   OnUser* / OnRoom*          → Lobby::apply_*
//!   OnUserMessage              → user-message routes (by command)
//!   OnRoomUserMessage          → user-message routes (by command)
//!   OnErrorClient/OnErrorServer → error routes (by error code)
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::time::SystemTime;

use rookery_dispatch::{Controller, DispatchError, Routes};
use rookery_protocol::{
    Destination, DestinationKind, Frame, PacketReader, ProtocolError, RoomId, SessionId, event,
};
use rookery_room::{Lobby, Room, User};

// ---------------------------------------------------------------------------
// UserMessage
// ---------------------------------------------------------------------------

/// Header bytes ahead of a user message body:
/// `[origin:u16][dest_kind:u8][dest_id:u16][command:u16]`.
const USER_MESSAGE_HEADER: usize = 7;

/// A message another client addressed to this one.
#[derive(Debug, Clone)]
pub struct UserMessage {
    origin: SessionId,
    destination: Destination,
    command: u16,
    received_at: SystemTime,
    frame: Frame,
}

impl UserMessage {
    pub fn decode(frame: &Frame) -> Result<Self, ProtocolError> {
        let mut r = frame.reader();
        let origin = SessionId(r.read()?);
        let kind = DestinationKind::try_from(r.read::<u8>()?)?;
        let id = r.read()?;
        let command = r.read()?;
        Ok(Self {
            origin,
            destination: Destination { kind, id },
            command,
            received_at: SystemTime::now(),
            frame: frame.clone(),
        })
    }

    /// Who sent it.
    pub fn origin(&self) -> SessionId {
        self.origin
    }

    pub fn destination(&self) -> Destination {
        self.destination
    }

    /// The application-defined command code.
    pub fn command(&self) -> u16 {
        self.command
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// The notification it arrived in (room-wide or direct).
    pub fn event_code(&self) -> u16 {
        self.frame.event_code()
    }

    /// The application body, after the message header.
    pub fn body(&self) -> &[u8] {
        &self.frame.body()[USER_MESSAGE_HEADER..]
    }

    /// A reader positioned at the start of the body.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self.body())
    }
}

// ---------------------------------------------------------------------------
// ErrorReport
// ---------------------------------------------------------------------------

/// Which side raised an [`ErrorReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    /// The server rejected something this client sent.
    Client,
    /// The server failed internally.
    Server,
}

/// An application error pushed by the server.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    source: ErrorSource,
    code: u16,
    frame: Frame,
}

impl ErrorReport {
    pub fn decode(source: ErrorSource, frame: &Frame) -> Result<Self, ProtocolError> {
        let code = frame.reader().read()?;
        Ok(Self {
            source,
            code,
            frame: frame.clone(),
        })
    }

    pub fn source(&self) -> ErrorSource {
        self.source
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Optional detail after the error code.
    pub fn detail(&self) -> &[u8] {
        &self.frame.body()[2..]
    }

    /// A reader positioned after the error code.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self.detail())
    }
}

// ---------------------------------------------------------------------------
// Installation
// ---------------------------------------------------------------------------

/// The routes built-in handlers forward to. Frozen once installed.
#[derive(Debug, Default)]
pub(crate) struct AppRoutes {
    pub(crate) user_messages: Routes<UserMessage>,
    pub(crate) client_errors: Routes<ErrorReport>,
    pub(crate) server_errors: Routes<ErrorReport>,
}

/// Registers every built-in handler on `controller`.
pub(crate) fn install(
    controller: &mut Controller,
    lobby: &Rc<RefCell<Lobby>>,
    routes: AppRoutes,
) -> Result<(), DispatchError> {
    let routes = Rc::new(routes);

    let l = Rc::clone(lobby);
    controller.register_builtin(event::ON_USER_UPDATED, move |frame: &Frame| {
        let user = User::decode(&mut frame.reader())?;
        l.borrow_mut().apply_user_updated(user);
        Ok(())
    })?;

    let l = Rc::clone(lobby);
    controller.register_builtin(event::ON_USER_ENTERED_ROOM, move |frame: &Frame| {
        let user = User::decode(&mut frame.reader())?;
        l.borrow_mut().apply_user_entered(user);
        Ok(())
    })?;

    let l = Rc::clone(lobby);
    controller.register_builtin(event::ON_USER_EXITED_ROOM, move |frame: &Frame| {
        let mut r = frame.reader();
        let session = SessionId(r.read()?);
        let room = RoomId(r.read()?);
        l.borrow_mut().apply_user_exited(session, room);
        Ok(())
    })?;

    let l = Rc::clone(lobby);
    controller.register_builtin(event::ON_ROOM_CREATED, move |frame: &Frame| {
        let room = Room::decode(&mut frame.reader())?;
        l.borrow_mut().apply_room_created(room);
        Ok(())
    })?;

    let l = Rc::clone(lobby);
    controller.register_builtin(event::ON_ROOM_UPDATED, move |frame: &Frame| {
        let room = Room::decode(&mut frame.reader())?;
        l.borrow_mut().apply_room_updated(room);
        Ok(())
    })?;

    let room_ops: [(u16, fn(&mut Lobby, RoomId) -> bool); 3] = [
        (event::ON_ROOM_REMOVED, Lobby::apply_room_removed),
        (event::ON_ROOM_LOCKED, Lobby::apply_room_locked),
        (event::ON_ROOM_UNLOCKED, Lobby::apply_room_unlocked),
    ];
    for (code, apply) in room_ops {
        let l = Rc::clone(lobby);
        controller.register_builtin(code, move |frame: &Frame| {
            let room = RoomId(frame.reader().read()?);
            if !apply(&mut l.borrow_mut(), room) {
                tracing::debug!(code, %room, "notification for unknown room");
            }
            Ok(())
        })?;
    }

    for code in [event::ON_USER_MESSAGE, event::ON_ROOM_USER_MESSAGE] {
        let r = Rc::clone(&routes);
        controller.register_builtin(code, move |frame: &Frame| {
            let message = UserMessage::decode(frame)?;
            match r.user_messages.invoke(message.command(), &message) {
                Some(result) => result,
                None => {
                    tracing::trace!(command = message.command(), "no user-message route");
                    Ok(())
                }
            }
        })?;
    }

    for (code, source) in [
        (event::ON_ERROR_CLIENT, ErrorSource::Client),
        (event::ON_ERROR_SERVER, ErrorSource::Server),
    ] {
        let r = Rc::clone(&routes);
        controller.register_builtin(code, move |frame: &Frame| {
            let report = ErrorReport::decode(source, frame)?;
            let table = match source {
                ErrorSource::Client => &r.client_errors,
                ErrorSource::Server => &r.server_errors,
            };
            match table.invoke(report.code(), &report) {
                Some(result) => result,
                None => {
                    tracing::debug!(?source, code = report.code(), "unhandled application error");
                    Ok(())
                }
            }
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_decode_positions_reader_at_body() {
        let body = [0x00, 0x09, 0x02, 0xff, 0xff, 0x00, 0x2a, 0x12, 0x34];
        let frame = Frame::from_parts(0x08, event::ON_ROOM_USER_MESSAGE, &body);
        let message = UserMessage::decode(&frame).unwrap();

        assert_eq!(message.origin(), SessionId(9));
        assert_eq!(message.destination(), Destination::room());
        assert_eq!(message.command(), 42);
        assert_eq!(message.event_code(), event::ON_ROOM_USER_MESSAGE);
        assert_eq!(message.reader().read::<u16>().unwrap(), 0x1234);
    }

    #[test]
    fn test_user_message_decode_short_header_fails() {
        let frame = Frame::from_parts(0x08, event::ON_USER_MESSAGE, &[0x00, 0x09, 0x02]);
        assert!(UserMessage::decode(&frame).is_err());
    }

    #[test]
    fn test_error_report_detail_follows_code() {
        let frame = Frame::from_parts(0x08, event::ON_ERROR_CLIENT, &[0x00, 0x00, 0x07]);
        let report = ErrorReport::decode(ErrorSource::Client, &frame).unwrap();
        assert_eq!(report.code(), 0);
        assert_eq!(report.detail(), &[0x07]);
        assert_eq!(report.source(), ErrorSource::Client);
    }

    #[test]
    fn test_install_registers_every_notification() {
        let mut controller = Controller::new();
        let lobby = Rc::new(RefCell::new(Lobby::new()));
        install(&mut controller, &lobby, AppRoutes::default()).unwrap();
        let table = controller.build();

        for code in [
            event::ON_USER_UPDATED,
            event::ON_USER_ENTERED_ROOM,
            event::ON_USER_EXITED_ROOM,
            event::ON_USER_MESSAGE,
            event::ON_ROOM_CREATED,
            event::ON_ROOM_UPDATED,
            event::ON_ROOM_REMOVED,
            event::ON_ROOM_LOCKED,
            event::ON_ROOM_UNLOCKED,
            event::ON_ROOM_USER_MESSAGE,
            event::ON_ERROR_SERVER,
            event::ON_ERROR_CLIENT,
        ] {
            assert!(table.handles_builtin(code), "{code:#06x}");
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_room_locked_frame_flips_status() {
        let mut controller = Controller::new();
        let lobby = Rc::new(RefCell::new(Lobby::new()));
        install(&mut controller, &lobby, AppRoutes::default()).unwrap();
        let table = controller.build();

        let created = Frame::from_parts(
            0x08,
            event::ON_ROOM_CREATED,
            &[0x00, 0x05, 0x00, 0x00, 0x04, 0x00, 0x01],
        );
        table.dispatch_builtin(&created).unwrap().unwrap();
        let locked = Frame::from_parts(0x08, event::ON_ROOM_LOCKED, &[0x00, 0x05]);
        table.dispatch_builtin(&locked).unwrap().unwrap();

        assert!(lobby.borrow().room(RoomId(5)).unwrap().is_locked());
    }
}
