use crate::config::{MatchPolicy, ProbeConfig};
use crate::error::{ErrorKind, Result};
use crate::net::channel::{Channel, EchoRef, Reply, ReplyKind};
use crate::net::socket::Socket;
use crate::probe::{ProbeOutcome, ProbeReport, ProbeTimestamp};
use crate::types::{Sequence, TimeToLive};
use std::io;
use std::marker::PhantomData;
use std::time::Instant;
use tracing::instrument;

/// Issue a single probe.
///
/// Session drivers are written against this trait so they can be exercised
/// without touching the network.
#[cfg_attr(test, mockall::automock)]
pub trait Prober {
    /// Probe the configured target at the given ttl.
    fn probe(&self, ttl: TimeToLive, sequence: Sequence) -> Result<ProbeReport>;
}

/// The ICMP probe engine.
///
/// Each call to [`ProbeEngine::probe`] performs one full blocking round trip:
/// build an echo request carrying the current wall-clock timestamp, transmit
/// it, block for the matching reply and classify the outcome. The transport
/// is acquired per call and released on every exit path.
pub struct ProbeEngine<S> {
    config: ProbeConfig,
    socket: PhantomData<S>,
}

/// The probe engine over the platform socket.
#[cfg(unix)]
pub type Engine = ProbeEngine<crate::net::platform::SocketImpl>;

impl<S: Socket> ProbeEngine<S> {
    #[must_use]
    pub const fn new(config: ProbeConfig) -> Self {
        Self {
            config,
            socket: PhantomData,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Send a single probe and block for the outcome.
    ///
    /// Returns [`crate::error::Error::ProbeFailed`] if the probe could not be
    /// transmitted; whether to continue the session is the caller's decision.
    #[instrument(skip(self), level = "trace")]
    pub fn probe(&self, ttl: TimeToLive, sequence: Sequence) -> Result<ProbeReport> {
        let mut channel = Channel::<S>::connect(&self.config)?;
        self.probe_on(&mut channel, ttl, sequence)
    }

    fn probe_on(
        &self,
        channel: &mut Channel<S>,
        ttl: TimeToLive,
        sequence: Sequence,
    ) -> Result<ProbeReport> {
        channel.set_ttl(ttl)?;
        let sent = ProbeTimestamp::now();
        channel.send_probe(sequence, sent).map_err(|err| {
            err.probe_failed(&ErrorKind::HostUnreachable)
                .probe_failed(&ErrorKind::NetUnreachable)
                .probe_failed(&ErrorKind::Std(io::ErrorKind::InvalidInput))
        })?;
        let deadline = Instant::now() + self.config.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::debug!(?ttl, ?sequence, "probe timed out");
                return Ok(ProbeReport::lost(ttl));
            }
            let Some(reply) = channel.recv_probe(remaining)? else {
                tracing::debug!(?ttl, ?sequence, "probe timed out");
                return Ok(ProbeReport::lost(ttl));
            };
            if let Some(report) = self.classify(&reply, ttl, sequence) {
                return Ok(report);
            }
            // not our reply, keep waiting within the remaining budget
        }
    }

    /// Classify a reply, or return `None` for traffic that is not ours.
    fn classify(&self, reply: &Reply, ttl: TimeToLive, sequence: Sequence) -> Option<ProbeReport> {
        let outcome = match reply.kind {
            ReplyKind::EchoReply {
                identifier,
                sequence: reply_sequence,
                timestamp,
            } => {
                let sent = timestamp?;
                if self.config.match_policy == MatchPolicy::Strict
                    && (identifier != self.config.identifier.0 || reply_sequence != sequence.0)
                {
                    tracing::debug!(identifier, reply_sequence, "skipping foreign echo reply");
                    return None;
                }
                let latency = sent.elapsed(ProbeTimestamp::now());
                return Some(ProbeReport {
                    ttl,
                    outcome: ProbeOutcome::EchoReply,
                    responder: Some(reply.addr),
                    latency: Some(latency),
                });
            }
            ReplyKind::TimeExceeded { original } => {
                self.check_original(original, sequence)?;
                ProbeOutcome::TimeExceeded
            }
            ReplyKind::Unreachable { original } => {
                self.check_original(original, sequence)?;
                ProbeOutcome::Unreachable
            }
            ReplyKind::Unrelated => return None,
        };
        Some(ProbeReport {
            ttl,
            outcome,
            responder: Some(reply.addr),
            latency: None,
        })
    }

    /// Under the strict policy, require the quoted original echo request to
    /// carry our identifier and sequence number.
    fn check_original(&self, original: Option<EchoRef>, sequence: Sequence) -> Option<()> {
        if self.config.match_policy == MatchPolicy::Loose {
            return Some(());
        }
        match original {
            Some(echo)
                if echo.identifier == self.config.identifier.0
                    && echo.sequence == sequence.0 =>
            {
                Some(())
            }
            _ => {
                tracing::debug!(?original, "skipping foreign control message");
                None
            }
        }
    }
}

impl<S: Socket> Prober for ProbeEngine<S> {
    fn probe(&self, ttl: TimeToLive, sequence: Sequence) -> Result<ProbeReport> {
        Self::probe(self, ttl, sequence)
    }
}
