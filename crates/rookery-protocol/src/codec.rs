//! The binary wire codec: a cursor over a fixed-capacity buffer.
//!
//! Every value on the wire is big-endian and has a fixed encoding:
//!
//! | Type                         | Encoding                                      |
//! |------------------------------|-----------------------------------------------|
//! | `bool`, `u8`, `i8`           | 1 byte                                        |
//! | `u16`, `i16`                 | 2 bytes BE                                    |
//! | `u32`, `i32`                 | 4 bytes BE                                    |
//! | `u64`, `i64`                 | 8 bytes BE                                    |
//! | `f32`, `f64`                 | IEEE-754 bits, BE                             |
//! | `str`, byte array, `[T]`     | `u16` BE count, then the elements             |
//! | `SystemTime`                 | `i64` count of 100ns ticks since UNIX epoch   |
//! | `Duration`                   | `f64` total seconds                           |
//!
//! The server composes 32-bit values as (high 16, low 16) and 64-bit values
//! as (high 32, low 32), each part big-endian. Both compositions are
//! byte-for-byte identical to plain big-endian, so `to_be_bytes` is used
//! directly.
//!
//! # Writing
//!
//! [`Packet`] owns an 8192-byte buffer. The first 3 bytes are reserved for
//! the frame header and length prefix, so the cursor starts at 3. Writes
//! chain:
//!
//! ```rust
//! use rookery_protocol::Packet;
//!
//! let mut packet = Packet::new();
//! packet.write(&7u16).write("hello").write(&true);
//! assert_eq!(packet.len(), 2 + (2 + 5) + 1);
//! ```
//!
//! A write that would not fit is skipped and remembered. [`Packet::encode`]
//! then fails with [`ProtocolError::Overflow`], so a too-large message can
//! never be sent half-written.
//!
//! # Reading
//!
//! [`PacketReader`] borrows a byte slice and hands out typed values, each
//! read returning `Result` so a short payload from the server is an error
//! instead of a panic.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::ProtocolError;

/// Bytes per packet buffer, header reservation included.
pub const PACKET_CAPACITY: usize = 8192;

/// Bytes reserved at the front of every packet for `[header][len:u16]`.
pub const HEADER_RESERVED: usize = 3;

/// Header of application packets: kind Original with flag nibble `0x3`.
pub const DEFAULT_HEADER: u8 = 0x39;

/// 100ns ticks per second.
const TICKS_PER_SECOND: i64 = 10_000_000;

// ---------------------------------------------------------------------------
// Wire traits
// ---------------------------------------------------------------------------

/// A value that knows how to append itself to a [`Packet`].
pub trait WireEncode {
    fn encode(&self, packet: &mut Packet);
}

/// A value that can be read back out of a payload.
pub trait WireDecode: Sized {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError>;
}

impl<T: WireEncode + ?Sized> WireEncode for &T {
    fn encode(&self, packet: &mut Packet) {
        (**self).encode(packet);
    }
}

macro_rules! impl_wire_number {
    ($($ty:ty),* $(,)?) => {$(
        impl WireEncode for $ty {
            fn encode(&self, packet: &mut Packet) {
                packet.write_raw(&self.to_be_bytes());
            }
        }

        impl WireDecode for $ty {
            fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
                Ok(<$ty>::from_be_bytes(reader.take_array()?))
            }
        }
    )*};
}

impl_wire_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl WireEncode for bool {
    fn encode(&self, packet: &mut Packet) {
        packet.write_raw(&[u8::from(*self)]);
    }
}

impl WireDecode for bool {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        Ok(u8::decode(reader)? != 0)
    }
}

impl WireEncode for str {
    fn encode(&self, packet: &mut Packet) {
        packet.write_bytes(self.as_bytes());
    }
}

impl WireEncode for String {
    fn encode(&self, packet: &mut Packet) {
        self.as_str().encode(packet);
    }
}

impl WireDecode for String {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let bytes = reader.read_bytes()?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

/// Arrays: `u16` element count, then each element.
///
/// For `[u8]` this is exactly the byte-array encoding, since each element
/// is one byte.
impl<T: WireEncode> WireEncode for [T] {
    fn encode(&self, packet: &mut Packet) {
        if !packet.write_len(self.len()) {
            return;
        }
        for item in self {
            item.encode(packet);
        }
    }
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, packet: &mut Packet) {
        self.as_slice().encode(packet);
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let count = u16::decode(reader)? as usize;
        let mut items = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            items.push(T::decode(reader)?);
        }
        Ok(items)
    }
}

impl WireEncode for SystemTime {
    fn encode(&self, packet: &mut Packet) {
        to_ticks(*self).encode(packet);
    }
}

impl WireDecode for SystemTime {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        from_ticks(i64::decode(reader)?)
    }
}

impl WireEncode for Duration {
    fn encode(&self, packet: &mut Packet) {
        self.as_secs_f64().encode(packet);
    }
}

impl WireDecode for Duration {
    fn decode(reader: &mut PacketReader<'_>) -> Result<Self, ProtocolError> {
        let secs = f64::decode(reader)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| ProtocolError::InvalidMessage(format!("duration {secs}s: {e}")))
    }
}

/// Converts a wall-clock time to 100ns ticks since the UNIX epoch.
///
/// Times before the epoch give negative ticks. Saturates at the `i64` range.
pub fn to_ticks(time: SystemTime) -> i64 {
    fn ticks(d: Duration) -> i64 {
        let whole = i64::try_from(d.as_secs())
            .unwrap_or(i64::MAX)
            .saturating_mul(TICKS_PER_SECOND);
        whole.saturating_add(i64::from(d.subsec_nanos() / 100))
    }
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => ticks(after),
        Err(before) => ticks(before.duration()).saturating_neg(),
    }
}

/// Converts 100ns ticks since the UNIX epoch back to wall-clock time.
pub fn from_ticks(ticks: i64) -> Result<SystemTime, ProtocolError> {
    let magnitude = ticks.unsigned_abs();
    let tps = TICKS_PER_SECOND as u64;
    let offset = Duration::new(magnitude / tps, ((magnitude % tps) * 100) as u32);
    let time = if ticks >= 0 {
        UNIX_EPOCH.checked_add(offset)
    } else {
        UNIX_EPOCH.checked_sub(offset)
    };
    time.ok_or_else(|| ProtocolError::InvalidMessage(format!("timestamp {ticks} out of range")))
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// What went wrong first while writing, reported by `encode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteFault {
    Overflow { attempted: usize },
    Length(usize),
}

/// An outbound message under construction.
///
/// Layout of the backing buffer:
///
/// ```text
///   0        1   2   3 ........................ cursor
///   [header] [len:u16] [payload written so far]
/// ```
///
/// Bytes 0..3 are only filled in by [`encode`](Packet::encode).
#[derive(Clone)]
pub struct Packet {
    header: u8,
    buf: Box<[u8]>,
    cursor: usize,
    fault: Option<WriteFault>,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("header", &format_args!("{:#04x}", self.header))
            .field("len", &self.len())
            .field("fault", &self.fault)
            .finish()
    }
}

impl Packet {
    /// An empty application packet ([`DEFAULT_HEADER`]).
    pub fn new() -> Self {
        Self::with_header(DEFAULT_HEADER)
    }

    pub fn with_header(header: u8) -> Self {
        Self {
            header,
            buf: vec![0u8; PACKET_CAPACITY].into_boxed_slice(),
            cursor: HEADER_RESERVED,
            fault: None,
        }
    }

    pub fn header(&self) -> u8 {
        self.header
    }

    pub fn set_header(&mut self, header: u8) -> &mut Self {
        self.header = header;
        self
    }

    /// Payload bytes written so far (excludes the 3-byte reservation).
    pub fn len(&self) -> usize {
        self.cursor - HEADER_RESERVED
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload written so far.
    pub fn payload(&self) -> &[u8] {
        &self.buf[HEADER_RESERVED..self.cursor]
    }

    /// A reader over this packet's payload, mostly useful in tests.
    pub fn reader(&self) -> PacketReader<'_> {
        PacketReader::new(self.payload())
    }

    /// Appends any wire value.
    pub fn write<T: WireEncode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(self);
        self
    }

    /// Appends a length-prefixed byte array.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        if self.write_len(bytes.len()) {
            self.write_raw(bytes);
        }
        self
    }

    /// Inlines another packet's payload verbatim, without a length prefix.
    ///
    /// The embedded bytes are opaque here; the receiver knows to read
    /// the rest of the body as the inner message.
    pub fn write_packet(&mut self, other: &Packet) -> &mut Self {
        self.write_raw(other.payload())
    }

    /// Appends bytes with no prefix. Skipped (and recorded) if they do
    /// not fit.
    pub fn write_raw(&mut self, bytes: &[u8]) -> &mut Self {
        if self.fault.is_some() {
            return self;
        }
        let end = self.cursor + bytes.len();
        if end > PACKET_CAPACITY {
            self.fault = Some(WriteFault::Overflow { attempted: end });
            return self;
        }
        self.buf[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        self
    }

    /// Writes a `u16` count. Returns false (and records the fault) if
    /// `len` does not fit.
    fn write_len(&mut self, len: usize) -> bool {
        match u16::try_from(len) {
            Ok(len) => {
                self.write_raw(&len.to_be_bytes());
                self.fault.is_none()
            }
            Err(_) => {
                self.fault.get_or_insert(WriteFault::Length(len));
                false
            }
        }
    }

    /// Produces the on-wire frame `[header][len:u16 BE][payload]`.
    ///
    /// `len` counts the bytes after the length field.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        match self.fault {
            Some(WriteFault::Overflow { attempted }) => {
                return Err(ProtocolError::Overflow {
                    attempted,
                    capacity: PACKET_CAPACITY,
                });
            }
            Some(WriteFault::Length(len)) => return Err(ProtocolError::LengthOverflow(len)),
            None => {}
        }
        let len = u16::try_from(self.len())
            .map_err(|_| ProtocolError::LengthOverflow(self.len()))?;
        let mut out = Vec::with_capacity(self.cursor);
        out.push(self.header);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(self.payload());
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// GamePacket
// ---------------------------------------------------------------------------

/// A [`Packet`] whose first two payload bytes are a 16-bit event code.
///
/// Derefs to `Packet`, so all the `write*` methods are available and the
/// body continues at offset 5.
#[derive(Debug, Clone)]
pub struct GamePacket {
    inner: Packet,
}

impl GamePacket {
    /// An application packet for `event_code`.
    pub fn new(event_code: u16) -> Self {
        Self::with_header(DEFAULT_HEADER, event_code)
    }

    pub fn with_header(header: u8, event_code: u16) -> Self {
        let mut inner = Packet::with_header(header);
        inner.write(&event_code);
        Self { inner }
    }

    /// The event code in bytes 3..5.
    pub fn event_code(&self) -> u16 {
        u16::from_be_bytes([self.inner.buf[3], self.inner.buf[4]])
    }

    /// The body written after the event code.
    pub fn body(&self) -> &[u8] {
        &self.inner.payload()[2..]
    }

    pub fn into_packet(self) -> Packet {
        self.inner
    }
}

impl Deref for GamePacket {
    type Target = Packet;

    fn deref(&self) -> &Packet {
        &self.inner
    }
}

impl DerefMut for GamePacket {
    fn deref_mut(&mut self) -> &mut Packet {
        &mut self.inner
    }
}

// ---------------------------------------------------------------------------
// PacketReader
// ---------------------------------------------------------------------------

/// A read cursor over a borrowed payload.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Reads any wire value.
    pub fn read<T: WireDecode>(&mut self) -> Result<T, ProtocolError> {
        T::decode(self)
    }

    /// Reads a length-prefixed byte array without copying.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        let len = self.read::<u16>()? as usize;
        self.take(len)
    }

    /// Takes the next `n` raw bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < n {
            return Err(ProtocolError::Truncated {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Everything not read yet. Does not advance.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: WireEncode + WireDecode + PartialEq + fmt::Debug>(value: T) {
        let mut packet = Packet::new();
        packet.write(&value);
        let mut reader = packet.reader();
        let decoded: T = reader.read().unwrap();
        assert_eq!(decoded, value);
        assert!(reader.is_empty(), "trailing bytes after {value:?}");
    }

    // =========================================================================
    // Primitive layout
    // =========================================================================

    #[test]
    fn test_write_integers_are_big_endian() {
        let mut p = Packet::new();
        p.write(&0x0102u16).write(&0x0304_0506u32).write(&-2i16);
        assert_eq!(p.payload(), &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xff, 0xfe]);
    }

    #[test]
    fn test_write_i64_matches_high_low_composition() {
        let value: i64 = -0x0123_4567_89ab_cdef;
        let high = (value >> 32) as i32;
        let low = value as u32;
        let mut composed = Packet::new();
        composed.write(&high).write(&low);

        let mut direct = Packet::new();
        direct.write(&value);
        assert_eq!(direct.payload(), composed.payload());
    }

    #[test]
    fn test_write_float_is_big_endian_ieee() {
        let mut p = Packet::new();
        p.write(&1.0f32);
        assert_eq!(p.payload(), &[0x3f, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_write_str_is_length_prefixed_utf8() {
        let mut p = Packet::new();
        p.write("hé");
        assert_eq!(p.payload(), &[0x00, 0x03, b'h', 0xc3, 0xa9]);
    }

    #[test]
    fn test_write_array_prefix_counts_elements_not_bytes() {
        let mut p = Packet::new();
        p.write(&vec![1u16, 2, 3]);
        assert_eq!(p.payload(), &[0x00, 0x03, 0, 1, 0, 2, 0, 3]);
    }

    // =========================================================================
    // Round trips
    // =========================================================================

    #[test]
    fn test_roundtrip_integer_extremes() {
        roundtrip(u8::MAX);
        roundtrip(i8::MIN);
        roundtrip(u16::MAX);
        roundtrip(i16::MIN);
        roundtrip(u32::MAX);
        roundtrip(i32::MIN);
        roundtrip(u64::MAX);
        roundtrip(i64::MIN);
        roundtrip(0i64);
    }

    #[test]
    fn test_roundtrip_floats_preserve_bits() {
        roundtrip(f32::MIN_POSITIVE);
        roundtrip(-0.0f64);
        roundtrip(f64::INFINITY);
        let mut p = Packet::new();
        p.write(&f64::NAN);
        assert!(p.reader().read::<f64>().unwrap().is_nan());
    }

    #[test]
    fn test_roundtrip_bool_string_and_arrays() {
        roundtrip(true);
        roundtrip(false);
        roundtrip(String::new());
        roundtrip("ルーム".to_string());
        roundtrip(vec![0u8, 255, 7]);
        roundtrip(vec!["a".to_string(), "bc".to_string()]);
        roundtrip(vec![vec![1u8], vec![]]);
        roundtrip(Vec::<i32>::new());
    }

    #[test]
    fn test_roundtrip_timestamp_at_tick_precision() {
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_700);
        roundtrip(t);
        let before_epoch = UNIX_EPOCH - Duration::new(86_400, 500);
        roundtrip(before_epoch);
    }

    #[test]
    fn test_roundtrip_duration_seconds() {
        roundtrip(Duration::from_millis(1500));
        roundtrip(Duration::ZERO);
    }

    #[test]
    fn test_to_ticks_one_second_is_ten_million() {
        assert_eq!(to_ticks(UNIX_EPOCH + Duration::from_secs(1)), 10_000_000);
        assert_eq!(to_ticks(UNIX_EPOCH - Duration::from_secs(1)), -10_000_000);
    }

    // =========================================================================
    // Embedding and GamePacket
    // =========================================================================

    #[test]
    fn test_write_packet_copies_payload_without_reservation() {
        let mut inner = GamePacket::new(0x0042);
        inner.write(&9u8);

        let mut outer = Packet::new();
        outer.write(&1u8).write_packet(&inner);

        assert_eq!(outer.payload(), &[1, 0x00, 0x42, 9]);
    }

    #[test]
    fn test_game_packet_code_occupies_bytes_three_and_four() {
        let mut p = GamePacket::new(0xbeef);
        p.write(&1u8);
        assert_eq!(p.event_code(), 0xbeef);
        assert_eq!(p.body(), &[1]);
        assert_eq!(p.encode().unwrap(), vec![0x39, 0x00, 0x03, 0xbe, 0xef, 0x01]);
    }

    // =========================================================================
    // Failure modes
    // =========================================================================

    #[test]
    fn test_encode_after_overflow_returns_overflow() {
        let mut p = Packet::new();
        p.write_raw(&[0u8; PACKET_CAPACITY - HEADER_RESERVED]);
        assert!(p.encode().is_ok());

        p.write(&1u8);
        assert!(matches!(
            p.encode(),
            Err(ProtocolError::Overflow { attempted: 8193, capacity: 8192 })
        ));
        // The failed write did not advance the cursor.
        assert_eq!(p.len(), PACKET_CAPACITY - HEADER_RESERVED);
    }

    #[test]
    fn test_encode_oversized_array_returns_length_overflow() {
        let mut p = Packet::new();
        p.write(&vec![false; 70_000]);
        assert!(matches!(p.encode(), Err(ProtocolError::LengthOverflow(70_000))));
        assert!(p.is_empty());
    }

    #[test]
    fn test_read_past_end_returns_truncated() {
        let mut r = PacketReader::new(&[0x01]);
        let err = r.read::<u16>().unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { offset: 0, needed: 2, len: 1 }));
    }

    #[test]
    fn test_read_string_invalid_utf8_returns_error() {
        let mut r = PacketReader::new(&[0x00, 0x01, 0xff]);
        assert!(matches!(r.read::<String>(), Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_read_negative_duration_returns_invalid_message() {
        let mut p = Packet::new();
        p.write(&-1.0f64);
        assert!(matches!(
            p.reader().read::<Duration>(),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
