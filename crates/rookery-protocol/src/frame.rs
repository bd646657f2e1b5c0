//! Frame reassembly and the fixed control frames.
//!
//! The transport hands us an ordered byte stream in whatever chunk sizes
//! it likes: half a header now, the rest of a frame three ticks later.
//! [`FrameAssembler`] is the state machine that turns that stream back
//! into whole frames.
//!
//! ```text
//!            ┌──────────── Hello (discard) ───────────┐
//!            ▼                                        │
//!        ┌────────┐ Established ┌───────────┐   ┌─────┴──────┐   ┌───────────┐
//!   ───→ │ Header │ ──────────→ │ KeepAlive │ → │ SessionIdHi│ → │ SessionIdLo│ ─→ Header
//!        └────────┘             └───────────┘   └────────────┘   └───────────┘
//!          │   │ Ntp  ┌───────────┐
//!          │   └────→ │ Ntp (16B) │ ─→ Header
//!          │          └───────────┘
//!          │ Builtin/Original ┌──────────┐   ┌──────────┐   ┌─────────────┐
//!          └────────────────→ │ LenHigh  │ → │ LenLow   │ → │ Payload (N) │ ─→ Header
//!                             └──────────┘   └──────────┘   └─────────────┘
//! ```
//!
//! Each state consumes exactly the bytes it needs. If the source runs dry
//! mid-state, [`FrameAssembler::poll`] returns `Ok(None)` and the next call
//! resumes in the same state with all partial progress kept.
//!
//! An unknown header byte is dropped on its own and the machine stays in
//! `Header`. There is no resynchronization beyond that: if the peer had
//! already sent payload bytes for that frame, they will be read as headers.

use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use crate::codec::{PacketReader, from_ticks, to_ticks};
use crate::{FrameKind, ProtocolError, SessionId};

// ---------------------------------------------------------------------------
// ByteSource
// ---------------------------------------------------------------------------

/// Anything the assembler can pull bytes from.
///
/// `Ok(0)` means "nothing more right now", never end-of-stream.
pub trait ByteSource {
    type Error;

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// A byte slice is a source that advances as it is read.
impl ByteSource for &[u8] {
    type Error = Infallible;

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let n = buf.len().min(self.len());
        buf[..n].copy_from_slice(&self[..n]);
        *self = &self[n..];
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// A fully assembled Builtin or Original frame.
///
/// The payload (`[event_code:u16][body]`) is reference-counted, so cloning
/// a frame to hand it to several handlers costs no copy.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    header: u8,
    payload: Rc<[u8]>,
}

impl Frame {
    /// Wraps a received payload. Fails if it is too short to hold an
    /// event code.
    pub fn new(header: u8, payload: impl Into<Rc<[u8]>>) -> Result<Self, ProtocolError> {
        let payload = payload.into();
        if payload.len() < 2 {
            return Err(ProtocolError::Truncated {
                offset: 0,
                needed: 2,
                len: payload.len(),
            });
        }
        Ok(Self { header, payload })
    }

    /// Builds a frame from its parts.
    pub fn from_parts(header: u8, event_code: u16, body: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(2 + body.len());
        payload.extend_from_slice(&event_code.to_be_bytes());
        payload.extend_from_slice(body);
        Self {
            header,
            payload: payload.into(),
        }
    }

    pub fn header(&self) -> u8 {
        self.header
    }

    pub fn kind(&self) -> Option<FrameKind> {
        FrameKind::from_header(self.header)
    }

    /// True when the header marks this as an engine-defined frame.
    pub fn is_builtin(&self) -> bool {
        self.kind() == Some(FrameKind::Builtin)
    }

    pub fn event_code(&self) -> u16 {
        u16::from_be_bytes([self.payload[0], self.payload[1]])
    }

    /// Everything after the event code.
    pub fn body(&self) -> &[u8] {
        &self.payload[2..]
    }

    /// The value of the frame's length field: event code plus body.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// A reader positioned at the start of the body.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self.body())
    }

    /// Re-encodes the frame as it appeared on the wire.
    ///
    /// Fails with [`ProtocolError::LengthOverflow`] when the event code and
    /// body together exceed what the 16-bit length field can describe.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let len = u16::try_from(self.payload.len())
            .map_err(|_| ProtocolError::LengthOverflow(self.payload.len()))?;
        let mut out = Vec::with_capacity(3 + self.payload.len());
        out.push(self.header);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("header", &format_args!("{:#04x}", self.header))
            .field("event_code", &format_args!("{:#06x}", self.event_code()))
            .field("body_len", &self.body().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// FrameEvent
// ---------------------------------------------------------------------------

/// Something the assembler recognised in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// The server accepted the session.
    Established {
        heartbeat_secs: u8,
        session_id: SessionId,
    },
    /// A clock sample stamped by the server.
    Ntp { sent_at: SystemTime },
    /// The server is closing (or has closed) the session.
    Teardown(FrameKind),
    /// A complete Builtin or Original frame, ready for dispatch.
    Frame(Frame),
}

// ---------------------------------------------------------------------------
// FrameAssembler
// ---------------------------------------------------------------------------

const NTP_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Header,
    KeepAlive,
    SessionIdHigh,
    SessionIdLow,
    Ntp,
    PayloadLenHigh,
    PayloadLenLow,
    Payload,
}

/// Incremental frame reassembly.
///
/// All partial progress lives in this struct, so it can be fed one byte
/// per tick or a whole burst at once and produce the same events.
#[derive(Debug)]
pub struct FrameAssembler {
    state: ReadState,
    header: u8,
    keep_alive: u8,
    session_high: u8,
    ntp: [u8; NTP_LEN],
    payload: Vec<u8>,
    filled: usize,
    discarded: u64,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            state: ReadState::Header,
            header: 0,
            keep_alive: 0,
            session_high: 0,
            ntp: [0; NTP_LEN],
            payload: Vec::new(),
            filled: 0,
            discarded: 0,
        }
    }

    /// Number of unrecognized header bytes dropped so far.
    pub fn discarded_headers(&self) -> u64 {
        self.discarded
    }

    /// True when no frame is partially assembled.
    pub fn is_idle(&self) -> bool {
        self.state == ReadState::Header
    }

    /// Forgets any partially assembled frame.
    pub fn reset(&mut self) {
        self.state = ReadState::Header;
        self.payload = Vec::new();
        self.filled = 0;
    }

    /// Advances until one event is complete or `source` runs dry.
    ///
    /// Call in a loop until it returns `Ok(None)` to drain everything
    /// currently available.
    pub fn poll<S: ByteSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<FrameEvent>, S::Error> {
        loop {
            match self.state {
                ReadState::Header => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    self.header = byte;
                    match FrameKind::from_header(byte) {
                        Some(FrameKind::Hello) => {
                            tracing::trace!("hello");
                        }
                        Some(kind @ (FrameKind::Closing | FrameKind::Closed)) => {
                            tracing::debug!(?kind, "teardown frame received");
                            return Ok(Some(FrameEvent::Teardown(kind)));
                        }
                        Some(FrameKind::Established) => self.state = ReadState::KeepAlive,
                        Some(FrameKind::Ntp) => {
                            self.filled = 0;
                            self.state = ReadState::Ntp;
                        }
                        Some(FrameKind::Builtin | FrameKind::Original) => {
                            self.state = ReadState::PayloadLenHigh;
                        }
                        Some(FrameKind::Authenticate | FrameKind::Proxy) | None => {
                            self.discarded += 1;
                            tracing::warn!(header = byte, "discarding unrecognized frame header");
                        }
                    }
                }
                ReadState::KeepAlive => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    self.keep_alive = byte;
                    self.state = ReadState::SessionIdHigh;
                }
                ReadState::SessionIdHigh => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    self.session_high = byte;
                    self.state = ReadState::SessionIdLow;
                }
                ReadState::SessionIdLow => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    self.state = ReadState::Header;
                    return Ok(Some(FrameEvent::Established {
                        heartbeat_secs: self.keep_alive,
                        session_id: SessionId(u16::from_be_bytes([self.session_high, byte])),
                    }));
                }
                ReadState::Ntp => {
                    let n = source.read_into(&mut self.ntp[self.filled..])?;
                    if n == 0 {
                        return Ok(None);
                    }
                    self.filled += n;
                    if self.filled < NTP_LEN {
                        continue;
                    }
                    self.filled = 0;
                    self.state = ReadState::Header;
                    let mut ticks = [0u8; 8];
                    ticks.copy_from_slice(&self.ntp[8..]);
                    match from_ticks(i64::from_be_bytes(ticks)) {
                        Ok(sent_at) => return Ok(Some(FrameEvent::Ntp { sent_at })),
                        Err(e) => tracing::warn!(error = %e, "ignoring ntp frame"),
                    }
                }
                ReadState::PayloadLenHigh => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    self.payload = vec![byte];
                    self.state = ReadState::PayloadLenLow;
                }
                ReadState::PayloadLenLow => {
                    let Some(byte) = read_byte(source)? else {
                        return Ok(None);
                    };
                    let len = u16::from_be_bytes([self.payload[0], byte]) as usize;
                    self.payload = vec![0; len];
                    self.filled = 0;
                    self.state = ReadState::Payload;
                }
                ReadState::Payload => {
                    if self.filled < self.payload.len() {
                        let n = source.read_into(&mut self.payload[self.filled..])?;
                        if n == 0 {
                            return Ok(None);
                        }
                        self.filled += n;
                        continue;
                    }
                    self.state = ReadState::Header;
                    self.filled = 0;
                    let payload = std::mem::take(&mut self.payload);
                    match Frame::new(self.header, payload) {
                        Ok(frame) => {
                            tracing::trace!(
                                code = frame.event_code(),
                                len = frame.payload_len(),
                                "frame assembled"
                            );
                            return Ok(Some(FrameEvent::Frame(frame)));
                        }
                        Err(e) => tracing::warn!(error = %e, "dropping frame without event code"),
                    }
                }
            }
        }
    }
}

fn read_byte<S: ByteSource + ?Sized>(source: &mut S) -> Result<Option<u8>, S::Error> {
    let mut byte = [0u8; 1];
    let n = source.read_into(&mut byte)?;
    Ok((n > 0).then_some(byte[0]))
}

// ---------------------------------------------------------------------------
// Control frames
// ---------------------------------------------------------------------------

/// `[0x04][token_len:u16 BE][token]`
pub fn authenticate_frame(token: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let len = u16::try_from(token.len()).map_err(|_| ProtocolError::LengthOverflow(token.len()))?;
    let mut out = Vec::with_capacity(3 + token.len());
    out.push(FrameKind::Authenticate.header());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(token);
    Ok(out)
}

/// `[0x00][timestamp:u64 BE, 100ns ticks]`
pub fn heartbeat_frame(now: SystemTime) -> [u8; 9] {
    let mut out = [0u8; 9];
    out[0] = FrameKind::Hello.header();
    out[1..].copy_from_slice(&to_ticks(now).to_be_bytes());
    out
}

/// `[0x01]`
pub fn closing_frame() -> [u8; 1] {
    [FrameKind::Closing.header()]
}
