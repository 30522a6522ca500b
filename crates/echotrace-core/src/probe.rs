use crate::types::TimeToLive;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The outcome of a single probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The target answered with an `EchoReply`.
    EchoReply,
    /// An intermediate hop discarded the probe and answered with
    /// `TimeExceeded`.
    TimeExceeded,
    /// A hop answered with `DestinationUnreachable`.
    Unreachable,
    /// No reply arrived within the timeout.
    TimedOut,
}

/// The report for a single probe attempt.
///
/// Created fresh per attempt and consumed by the calling session driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeReport {
    /// The ttl the probe was sent with.
    pub ttl: TimeToLive,
    /// How the probe concluded.
    pub outcome: ProbeOutcome,
    /// The immediate sender of the reply, if any.
    ///
    /// For `TimeExceeded` this is the intermediate router, not the target.
    pub responder: Option<Ipv4Addr>,
    /// The round trip time, for `EchoReply` outcomes only.
    pub latency: Option<Duration>,
}

impl ProbeReport {
    #[must_use]
    pub const fn lost(ttl: TimeToLive) -> Self {
        Self {
            ttl,
            outcome: ProbeOutcome::TimedOut,
            responder: None,
            latency: None,
        }
    }

    /// The round trip time in fractional milliseconds.
    #[must_use]
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(|l| l.as_secs_f64() * 1000.0)
    }
}

/// The wall-clock timestamp embedded in the echo request payload.
///
/// Encoded as two big-endian `u64` values, whole seconds and microseconds
/// since the Unix epoch. The target echoes the payload back verbatim which
/// makes the timestamp both the correlation key and the latency source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimestamp {
    secs: u64,
    micros: u64,
}

impl ProbeTimestamp {
    /// The encoded size in bytes.
    pub const SIZE: usize = 16;

    #[cfg(test)]
    pub(crate) const fn from_parts(secs: u64, micros: u64) -> Self {
        Self { secs, micros }
    }

    /// Sample the wall clock.
    #[must_use]
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            secs: elapsed.as_secs(),
            micros: u64::from(elapsed.subsec_micros()),
        }
    }

    #[must_use]
    pub fn encode(self) -> [u8; Self::SIZE] {
        let mut bytes = [0_u8; Self::SIZE];
        bytes[..8].copy_from_slice(&self.secs.to_be_bytes());
        bytes[8..].copy_from_slice(&self.micros.to_be_bytes());
        bytes
    }

    /// Decode a timestamp from the leading bytes of a reply payload.
    ///
    /// Returns `None` for payloads too short to carry a timestamp or whose
    /// microsecond field is out of range, which marks the reply as unrelated
    /// traffic.
    #[must_use]
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < Self::SIZE {
            return None;
        }
        let secs = u64::from_be_bytes(payload[..8].try_into().ok()?);
        let micros = u64::from_be_bytes(payload[8..Self::SIZE].try_into().ok()?);
        if micros >= 1_000_000 {
            return None;
        }
        Some(Self { secs, micros })
    }

    /// The elapsed time between this timestamp and `later`.
    ///
    /// Saturates to zero if the clock stepped backwards in between.
    #[must_use]
    pub fn elapsed(&self, later: Self) -> Duration {
        let sent = Duration::new(self.secs, (self.micros * 1000) as u32);
        let now = Duration::new(later.secs, (later.micros * 1000) as u32);
        now.saturating_sub(sent)
    }
}
