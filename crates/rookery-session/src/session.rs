//! Session state: the client's record of its one connection.
//!
//! It tracks:
//! - WHERE the lifecycle is (`Idle`, `Connected`, `Stopped`)
//! - WHO the server says we are (the `SessionId` from Established)
//! - WHEN the next heartbeat is due
//! - HOW healthy the link looks (latency samples, failed sends)

use std::fmt;
use std::time::{Duration, Instant, SystemTime};

use rookery_protocol::SessionId;

use crate::{ClientConfig, Heartbeat, SessionError};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Lifecycle of a client session.
///
/// ```text
///   Idle ──(start)──→ Connected ──(stop)──→ Stopped
/// ```
///
/// There is no way back: a stopped session is finished, and its dispatch
/// table is already sealed. Build a new client to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connected,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connected => write!(f, "connected"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Per-session bookkeeping that outlives individual ticks.
#[derive(Debug, Clone)]
pub struct SessionState {
    phase: Phase,
    session_id: Option<SessionId>,
    heartbeat: Heartbeat,
    last_latency: Option<Duration>,
    failed_sends: u64,
}

impl SessionState {
    pub fn new(config: &ClientConfig, now: Instant) -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            heartbeat: Heartbeat::new(config.default_heartbeat(), now),
            last_latency: None,
            failed_sends: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    /// `Idle → Connected`.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.phase != Phase::Idle {
            return Err(SessionError::AlreadyStarted);
        }
        self.phase = Phase::Connected;
        Ok(())
    }

    /// `Connected → Stopped`. Returns false if the session was not connected.
    pub fn end(&mut self) -> bool {
        if self.phase != Phase::Connected {
            return false;
        }
        self.phase = Phase::Stopped;
        true
    }

    /// Applies the Established frame: our id and the server's keep-alive.
    pub fn establish(&mut self, session_id: SessionId, heartbeat_secs: u8) {
        self.session_id = Some(session_id);
        self.heartbeat
            .set_interval(Duration::from_secs(u64::from(heartbeat_secs)));
    }

    /// Assigned by the server; `None` until Established arrives.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        &self.heartbeat
    }

    pub fn heartbeat_mut(&mut self) -> &mut Heartbeat {
        &mut self.heartbeat
    }

    /// Records `now - sent_at` from an NTP sample. A sample from the future
    /// (clock skew) records zero.
    pub fn record_latency(&mut self, sent_at: SystemTime, now: SystemTime) -> Duration {
        let latency = now.duration_since(sent_at).unwrap_or(Duration::ZERO);
        self.last_latency = Some(latency);
        latency
    }

    pub fn last_latency(&self) -> Option<Duration> {
        self.last_latency
    }

    pub fn record_failed_send(&mut self) {
        self.failed_sends += 1;
    }

    pub fn failed_sends(&self) -> u64 {
        self.failed_sends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(&ClientConfig::default(), Instant::now())
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Idle.to_string(), "idle");
        assert_eq!(Phase::Connected.to_string(), "connected");
        assert_eq!(Phase::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_begin_then_end_walks_lifecycle() {
        let mut s = state();
        assert_eq!(s.phase(), Phase::Idle);
        s.begin().unwrap();
        assert!(s.is_connected());
        assert!(s.end());
        assert_eq!(s.phase(), Phase::Stopped);
    }

    #[test]
    fn test_begin_twice_returns_already_started() {
        let mut s = state();
        s.begin().unwrap();
        assert!(matches!(s.begin(), Err(SessionError::AlreadyStarted)));
        s.end();
        assert!(matches!(s.begin(), Err(SessionError::AlreadyStarted)));
    }

    #[test]
    fn test_end_when_idle_returns_false() {
        let mut s = state();
        assert!(!s.end());
        assert_eq!(s.phase(), Phase::Idle);
    }

    #[test]
    fn test_establish_sets_session_and_interval() {
        let mut s = state();
        assert_eq!(s.heartbeat().interval(), Duration::from_secs(1));
        s.establish(SessionId(77), 5);
        assert_eq!(s.session_id(), Some(SessionId(77)));
        assert_eq!(s.heartbeat().interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_record_latency_future_sample_is_zero() {
        let mut s = state();
        let now = SystemTime::now();
        assert_eq!(
            s.record_latency(now + Duration::from_secs(3), now),
            Duration::ZERO
        );
        assert_eq!(
            s.record_latency(now - Duration::from_millis(40), now),
            Duration::from_millis(40)
        );
        assert_eq!(s.last_latency(), Some(Duration::from_millis(40)));
    }
}
