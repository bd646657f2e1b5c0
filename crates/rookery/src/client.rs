//! The client: one session against one realtime server.
//!
//! A [`Client`] owns the transport, the frame assembler, the dispatch
//! controller, and the lobby mirror. Nothing runs on its own; the host
//! application drives it:
//!
//! ```text
//!   Idle ──start()──→ Connected ──tick()*──→ ... ──stop()──→ Stopped
//!          │                       │
//!          │ discovery lookup      │ transport.update()
//!          │ transport.connect()   │ drain + dispatch frames
//!          │ seal dispatch table   │ heartbeat when due
//!          │ send Authenticate     │
//! ```
//!
//! Handlers, middleware, and routes must be registered before `start`;
//! `start` seals them into an immutable table.

use std::cell::{Ref, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime};

use rookery_dispatch::{Controller, DispatchError, DispatchTable, Handler, HandlerResult};
use rookery_protocol::{
    ByteSource, Destination, Frame, FrameAssembler, FrameEvent, FrameKind, GamePacket, Packet,
    RoomId, SessionId, authenticate_frame, closing_frame, event, heartbeat_frame,
};
use rookery_room::Lobby;
use rookery_session::{ClientConfig, Credential, Discovery, Phase, SessionError, SessionState};
use rookery_transport::{Transport, TransportError, send_all};

use crate::RookeryError;
use crate::builtin::{self, AppRoutes, ErrorReport, UserMessage};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use rookery::prelude::*;
///
/// let credential = Credential::parse("...");
/// let discovery = StaticDiscovery::new(ServerDescriptor::new("127.0.0.1", 7000));
/// let mut client = ClientBuilder::new()
///     .host_override("127.0.0.1")
///     .build(credential, TcpTransport::new(), discovery);
/// client.start()?;
/// # Ok::<(), RookeryError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration. Out-of-range values are fixed up.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config.validated();
        self
    }

    /// Connects to `host` instead of the discovered host.
    pub fn host_override(mut self, host: impl Into<String>) -> Self {
        self.config.host_override = Some(host.into());
        self
    }

    /// Caps the bytes requested from the transport per receive call.
    pub fn receive_chunk(mut self, bytes: usize) -> Self {
        self.config.receive_chunk = bytes.max(1);
        self
    }

    pub fn build<T, D>(self, credential: Credential, transport: T, discovery: D) -> Client<T, D>
    where
        T: Transport,
        D: Discovery,
    {
        Client {
            state: SessionState::new(&self.config, Instant::now()),
            config: self.config,
            credential,
            transport,
            discovery,
            controller: Controller::new(),
            table: None,
            routes: AppRoutes::default(),
            assembler: FrameAssembler::new(),
            lobby: Rc::new(RefCell::new(Lobby::new())),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A realtime session driven by [`tick`](Client::tick).
pub struct Client<T: Transport, D: Discovery> {
    config: ClientConfig,
    credential: Credential,
    transport: T,
    discovery: D,
    controller: Controller,
    table: Option<DispatchTable>,
    routes: AppRoutes,
    assembler: FrameAssembler,
    state: SessionState,
    lobby: Rc<RefCell<Lobby>>,
}

impl<T: Transport, D: Discovery> Client<T, D> {
    /// A client with the default configuration.
    pub fn new(credential: Credential, transport: T, discovery: D) -> Self {
        ClientBuilder::new().build(credential, transport, discovery)
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Adds a handler for `code`. Several handlers per code all run, in
    /// registration order.
    pub fn register_handler<F>(&mut self, code: u16, handler: F) -> Result<(), RookeryError>
    where
        F: Fn(&Frame) -> HandlerResult + 'static,
    {
        Ok(self.controller.register_handler(code, handler)?)
    }

    /// Adds middleware around every handler whose code shares the top
    /// `level` bits of `code`. See [`rookery_dispatch`] for the nesting
    /// rules.
    pub fn register_middleware<M>(
        &mut self,
        code: u16,
        level: u8,
        middleware: M,
    ) -> Result<(), RookeryError>
    where
        M: Fn(Handler) -> Handler + 'static,
    {
        Ok(self.controller.register_middleware(code, level, middleware)?)
    }

    /// Routes user messages carrying `command` to `f`.
    pub fn on_user_message<F>(&mut self, command: u16, f: F) -> Result<(), RookeryError>
    where
        F: Fn(&UserMessage) -> HandlerResult + 'static,
    {
        self.check_open()?;
        self.routes.user_messages.add(command, f);
        Ok(())
    }

    /// Routes client-side application errors with `code` to `f`.
    pub fn on_client_error<F>(&mut self, code: u16, f: F) -> Result<(), RookeryError>
    where
        F: Fn(&ErrorReport) -> HandlerResult + 'static,
    {
        self.check_open()?;
        self.routes.client_errors.add(code, f);
        Ok(())
    }

    /// Routes server-side application errors with `code` to `f`.
    pub fn on_server_error<F>(&mut self, code: u16, f: F) -> Result<(), RookeryError>
    where
        F: Fn(&ErrorReport) -> HandlerResult + 'static,
    {
        self.check_open()?;
        self.routes.server_errors.add(code, f);
        Ok(())
    }

    fn check_open(&self) -> Result<(), DispatchError> {
        if self.controller.is_sealed() {
            return Err(DispatchError::Sealed);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn start(&mut self) -> Result<(), RookeryError> {
        self.start_at(Instant::now())
    }

    /// Resolves the endpoint, connects, seals the dispatch table, and
    /// authenticates. The heartbeat interval starts counting at `now`.
    ///
    /// Discovery, connect, and authenticate failures leave the client idle
    /// with the transport closed, so `start` can be retried.
    pub fn start_at(&mut self, now: Instant) -> Result<(), RookeryError> {
        if self.state.phase() != Phase::Idle {
            return Err(SessionError::AlreadyStarted.into());
        }

        let app_id = self.credential.app_id();
        if app_id.is_empty() {
            return Err(SessionError::InvalidCredential.into());
        }
        let descriptor = self
            .discovery
            .lookup(&app_id)?
            .ok_or_else(|| SessionError::EndpointNotFound {
                app_id: app_id.clone(),
            })?;
        let host = match &self.config.host_override {
            Some(host) => {
                tracing::debug!(discovered = %descriptor.host, %host, "overriding discovered host");
                host.clone()
            }
            None => descriptor.host.clone(),
        };

        self.transport.connect(&host, descriptor.port)?;

        if self.table.is_none() {
            let routes = std::mem::take(&mut self.routes);
            builtin::install(&mut self.controller, &self.lobby, routes)?;
            self.table = Some(self.controller.build());
        }

        if let Err(e) = self.authenticate() {
            self.release();
            return Err(e);
        }

        self.state.begin()?;
        self.state.heartbeat_mut().reset(now);
        tracing::info!(%host, port = descriptor.port, %app_id, "session started");
        Ok(())
    }

    fn authenticate(&mut self) -> Result<(), RookeryError> {
        let auth = authenticate_frame(self.credential.token())?;
        self.write(&auth)
    }

    pub fn tick(&mut self) -> Result<(), RookeryError> {
        self.tick_at(Instant::now())
    }

    /// Pumps the transport, dispatches every complete frame, and sends a
    /// heartbeat if one is due at `now`.
    ///
    /// Does nothing unless the session is connected. A failing handler is
    /// logged and the tick carries on; transport failures are returned.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), RookeryError> {
        if !self.state.is_connected() {
            self.state.heartbeat_mut().reset(now);
            return Ok(());
        }

        self.transport.update()?;

        while self.state.is_connected() {
            let polled = {
                let mut inbound = Inbound {
                    transport: &mut self.transport,
                    chunk: self.config.receive_chunk,
                };
                self.assembler.poll(&mut inbound)?
            };
            match polled {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }

        if self.state.is_connected() && self.state.heartbeat_mut().poll(now) {
            self.write(&heartbeat_frame(SystemTime::now()))?;
            tracing::trace!("heartbeat sent");
        }
        Ok(())
    }

    /// Sends a Closing frame and ends the session. No acknowledgement is
    /// awaited. Stopping a client that is not connected does nothing.
    pub fn stop(&mut self) -> Result<(), RookeryError> {
        if !self.state.end() {
            return Ok(());
        }
        let sent = self.write(&closing_frame());
        self.release();
        tracing::info!("session stopped");
        sent
    }

    fn handle_event(&mut self, event: FrameEvent) {
        match event {
            FrameEvent::Established {
                heartbeat_secs,
                session_id,
            } => {
                self.state.establish(session_id, heartbeat_secs);
                self.lobby.borrow_mut().set_self_session(session_id);
                tracing::info!(%session_id, heartbeat_secs, "session established");
            }
            FrameEvent::Ntp { sent_at } => {
                let latency = self.state.record_latency(sent_at, SystemTime::now());
                tracing::debug!(latency_us = latency.as_micros() as u64, "ntp sample");
            }
            FrameEvent::Teardown(kind) => {
                tracing::info!(?kind, "server ended the session");
                self.state.end();
                self.release();
            }
            FrameEvent::Frame(frame) => self.dispatch(&frame),
        }
    }

    /// Runs the builtin table (for builtin frames) and then the main table.
    fn dispatch(&self, frame: &Frame) {
        let Some(table) = &self.table else {
            return;
        };
        let code = frame.event_code();
        self.lobby.borrow_mut().begin_event(code);

        if frame.is_builtin() {
            if let Some(Err(e)) = table.dispatch_builtin(frame) {
                tracing::warn!(code, error = %e, "built-in handler failed");
            }
        }
        match table.dispatch(frame) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::warn!(code, error = %e, "handler failed"),
            None => tracing::trace!(code, "no handler registered"),
        }
    }

    fn release(&mut self) {
        self.assembler.reset();
        if let Err(e) = self.transport.close() {
            tracing::debug!(error = %e, "transport close failed");
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Sends already-framed bytes.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<(), RookeryError> {
        if !self.state.is_connected() {
            return Err(SessionError::NotConnected.into());
        }
        self.write(bytes)
    }

    /// Frames and sends a packet. [`GamePacket`]s deref to `Packet`.
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), RookeryError> {
        let bytes = packet.encode()?;
        self.send_raw(&bytes)
    }

    pub fn room_create(&mut self) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_CREATE, |_| {})
    }

    pub fn room_enter(&mut self, room: RoomId) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_ENTER, |p| {
            p.write(&room.0);
        })
    }

    pub fn room_exit(&mut self) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_EXIT, |_| {})
    }

    pub fn room_lock(&mut self) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_LOCK, |_| {})
    }

    pub fn room_unlock(&mut self) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_UNLOCK, |_| {})
    }

    /// Asks matchmaking for a room tagged `tag` holding `capacity` users.
    pub fn room_match(&mut self, tag: &str, capacity: u16) -> Result<(), RookeryError> {
        self.send_builtin(event::ROOM_MATCH, |p| {
            p.write(tag).write(&capacity);
        })
    }

    /// Sends an application-defined message to `destination`.
    ///
    /// `body`, if any, is inlined after the command without a length
    /// prefix; receivers read it from [`UserMessage::reader`].
    pub fn send_user_message(
        &mut self,
        command: u16,
        body: Option<&Packet>,
        destination: Destination,
    ) -> Result<(), RookeryError> {
        self.send_builtin(event::USER_MESSAGE, |p| {
            p.write(&(destination.kind as u8))
                .write(&destination.id)
                .write(&command);
            if let Some(body) = body {
                p.write_packet(body);
            }
        })
    }

    fn send_builtin(
        &mut self,
        code: u16,
        fill: impl FnOnce(&mut Packet),
    ) -> Result<(), RookeryError> {
        let mut packet = GamePacket::with_header(FrameKind::Builtin.header(), code);
        fill(&mut *packet);
        self.send_packet(&packet)
    }

    /// Pushes bytes through the transport, counting failures.
    fn write(&mut self, bytes: &[u8]) -> Result<(), RookeryError> {
        match send_all(&mut self.transport, bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state.record_failed_send();
                tracing::warn!(error = %e, bytes = bytes.len(), "send failed");
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The world model. Do not hold the borrow across `tick`.
    pub fn lobby(&self) -> Ref<'_, Lobby> {
        self.lobby.borrow()
    }

    /// A shared handle to the world model, for handlers that read it.
    pub fn lobby_handle(&self) -> Rc<RefCell<Lobby>> {
        Rc::clone(&self.lobby)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Assigned by the server once the session is established.
    pub fn session_id(&self) -> Option<SessionId> {
        self.state.session_id()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.state.heartbeat().interval()
    }

    /// Latency computed from the most recent NTP frame.
    pub fn last_latency(&self) -> Option<Duration> {
        self.state.last_latency()
    }

    pub fn failed_sends(&self) -> u64 {
        self.state.failed_sends()
    }

    pub fn discarded_headers(&self) -> u64 {
        self.assembler.discarded_headers()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Feeds the assembler from the transport, at most `chunk` bytes per call.
struct Inbound<'a, T: Transport> {
    transport: &'a mut T,
    chunk: usize,
}

impl<T: Transport> ByteSource for Inbound<'_, T> {
    type Error = TransportError;

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.chunk);
        self.transport.recv(&mut buf[..n])
    }
}
