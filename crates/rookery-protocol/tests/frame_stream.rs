//! Stream-level tests for the frame assembler: fragmentation, interleaving,
//! and recovery from garbage header bytes.

use std::convert::Infallible;

use rookery_protocol::{
    ByteSource, Frame, FrameAssembler, FrameEvent, FrameKind, GamePacket, SessionId, event,
};

/// Yields at most `chunk` bytes per read, and nothing on every other read,
/// the way a transport looks across several ticks.
struct Trickle<'a> {
    bytes: &'a [u8],
    chunk: usize,
    starve: bool,
}

impl ByteSource for Trickle<'_> {
    type Error = Infallible;

    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        self.starve = !self.starve;
        if self.starve {
            return Ok(0);
        }
        let n = buf.len().min(self.chunk).min(self.bytes.len());
        buf[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes = &self.bytes[n..];
        Ok(n)
    }
}

/// Feeds `bytes` in `chunk`-sized pieces across as many "ticks" as it takes.
fn assemble_trickled(bytes: &[u8], chunk: usize) -> Vec<FrameEvent> {
    let mut assembler = FrameAssembler::new();
    let mut source = Trickle {
        bytes,
        chunk,
        starve: false,
    };
    let mut events = Vec::new();
    let mut idle_ticks = 0;
    while idle_ticks < 4 {
        // One tick: drain until the source reports nothing.
        let mut produced = false;
        while let Some(event) = assembler.poll(&mut source).unwrap() {
            events.push(event);
            produced = true;
        }
        if source.bytes.is_empty() && !produced {
            idle_ticks += 1;
        }
    }
    events
}

fn assemble_whole(mut bytes: &[u8]) -> Vec<FrameEvent> {
    let mut assembler = FrameAssembler::new();
    let mut events = Vec::new();
    while let Some(event) = assembler.poll(&mut bytes).unwrap() {
        events.push(event);
    }
    events
}

/// A realistic session opening: established, ntp, several frames.
fn sample_stream() -> Vec<u8> {
    let mut stream = vec![0x03, 0x02, 0x00, 0x2a];
    stream.push(0x00);

    stream.push(0x05);
    stream.extend_from_slice(&[0u8; 8]);
    stream.extend_from_slice(&16_000_000_000_000_000i64.to_be_bytes());

    let mut created = GamePacket::with_header(FrameKind::Builtin.header(), event::ON_ROOM_CREATED);
    created.write(&5u16).write(&0u8).write(&4u16).write(&0x2au16);
    created.write(&0xffffu16).write(&0xffffu16);
    stream.extend(created.encode().unwrap());

    let mut app = GamePacket::new(0x0001);
    app.write("hello, room").write(&vec![1.5f32, -2.0]);
    stream.extend(app.encode().unwrap());

    let mut big = GamePacket::new(0x7fff);
    big.write_raw(&[0xab; 3000]);
    stream.extend(big.encode().unwrap());

    stream
}

#[test]
fn test_poll_any_chunk_size_matches_whole_stream() {
    let stream = sample_stream();
    let expected = assemble_whole(&stream);
    assert_eq!(expected.len(), 5);

    for chunk in [1, 2, 3, 5, 7, 16, 64, 1000, stream.len()] {
        assert_eq!(assemble_trickled(&stream, chunk), expected, "chunk size {chunk}");
    }
}

#[test]
fn test_poll_split_at_every_boundary_matches_whole_stream() {
    let stream = sample_stream();
    let expected = assemble_whole(&stream);

    for split in 0..=stream.len() {
        let mut assembler = FrameAssembler::new();
        let mut events = Vec::new();
        let (mut first, mut second) = stream.split_at(split);
        while let Some(e) = assembler.poll(&mut first).unwrap() {
            events.push(e);
        }
        while let Some(e) = assembler.poll(&mut second).unwrap() {
            events.push(e);
        }
        assert_eq!(events, expected, "split at {split}");
    }
}

#[test]
fn test_poll_malformed_header_discards_exactly_one_byte() {
    let good = Frame::from_parts(0x08, event::ON_ROOM_REMOVED, &[0x00, 0x05])
        .to_bytes()
        .unwrap();

    let mut stream = good.clone();
    stream.push(0x0e); // garbage between two well-formed frames
    stream.extend_from_slice(&good);

    let mut assembler = FrameAssembler::new();
    let mut source = stream.as_slice();
    let mut frames = Vec::new();
    while let Some(event) = assembler.poll(&mut source).unwrap() {
        frames.push(event);
    }

    assert_eq!(assembler.discarded_headers(), 1);
    assert_eq!(frames.len(), 2);
    for event in frames {
        let FrameEvent::Frame(frame) = event else {
            panic!("expected frames only");
        };
        assert_eq!(frame.event_code(), event::ON_ROOM_REMOVED);
        assert_eq!(frame.body(), &[0x00, 0x05]);
    }
    assert!(assembler.is_idle());
}

#[test]
fn test_poll_partial_frame_resumes_next_call() {
    let bytes = Frame::from_parts(0x09, 0x1234, b"abcdef").to_bytes().unwrap();
    let mut assembler = FrameAssembler::new();

    let mut head = &bytes[..4];
    assert_eq!(assembler.poll(&mut head).unwrap(), None);
    assert!(!assembler.is_idle());

    let mut tail = &bytes[4..];
    let event = assembler.poll(&mut tail).unwrap();
    let Some(FrameEvent::Frame(frame)) = event else {
        panic!("expected a frame, got {event:?}");
    };
    assert_eq!(frame.event_code(), 0x1234);
    assert_eq!(frame.body(), b"abcdef");
    assert!(!frame.is_builtin());
}

#[test]
fn test_poll_established_split_across_calls() {
    let mut assembler = FrameAssembler::new();
    for byte in [0x03u8, 0x0a, 0x01] {
        assert_eq!(assembler.poll(&mut [byte].as_slice()).unwrap(), None);
    }
    assert_eq!(
        assembler.poll(&mut [0xf4u8].as_slice()).unwrap(),
        Some(FrameEvent::Established {
            heartbeat_secs: 10,
            session_id: SessionId(0x01f4),
        })
    );
}

#[test]
fn test_poll_closed_frame_yields_teardown_and_stays_usable() {
    let mut stream = vec![0x02];
    stream.extend(Frame::from_parts(0x09, 1, &[]).to_bytes().unwrap());
    let events = assemble_whole(&stream);
    assert_eq!(events[0], FrameEvent::Teardown(FrameKind::Closed));
    assert!(matches!(events[1], FrameEvent::Frame(_)));
}
