use crate::config::PingConfig;
use crate::engine::Prober;
use crate::error::{Error, Result};
use crate::probe::ProbeOutcome;
use crate::types::Sequence;
use tracing::instrument;

/// Running latency and loss aggregates for a ping session.
///
/// The first successful sample seeds `min`, `max` and `sum` rather than
/// comparing against the zero-initialised values, since `0.0` is a valid
/// minimum only if it is ever observed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingStatistics {
    /// The number of probes attempted.
    pub count: u32,
    /// The number of probes which did not produce an echo reply.
    pub lost: u32,
    /// The smallest observed round trip, in milliseconds.
    pub min: f64,
    /// The largest observed round trip, in milliseconds.
    pub max: f64,
    /// The sum of observed round trips, in milliseconds.
    pub sum: f64,
    /// The mean round trip over all attempted probes, in milliseconds.
    ///
    /// Note this is `sum / count`, not `sum / replies`: a session where
    /// every probe was lost has `avg == 0.0`, which means "no data" rather
    /// than zero latency. Check [`PingStatistics::all_lost`] before trusting
    /// it.
    pub avg: f64,
}

impl PingStatistics {
    /// The percentage of probes lost.
    #[must_use]
    pub fn loss_percent(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            f64::from(self.lost) / f64::from(self.count) * 100.0
        }
    }

    /// Whether every probe of the session was lost.
    #[must_use]
    pub const fn all_lost(&self) -> bool {
        self.lost == self.count
    }
}

/// Probe a fixed destination repeatedly and aggregate loss and latency.
///
/// Every outcome other than an echo reply counts as a lost probe. A probe
/// which fails to send is counted as lost and the session continues; any
/// other error aborts the session.
#[instrument(skip(prober), level = "trace")]
pub fn ping<P: Prober>(prober: &P, config: &PingConfig) -> Result<PingStatistics> {
    if config.count == 0 {
        return Err(Error::BadConfig(String::from("count must be non-zero")));
    }
    let mut stats = PingStatistics {
        count: config.count,
        ..Default::default()
    };
    let mut first_sample = true;
    let mut sequence = Sequence::default();
    for _ in 0..config.count {
        let latency_ms = match prober.probe(config.ttl, sequence) {
            Ok(report) if report.outcome == ProbeOutcome::EchoReply => report.latency_ms(),
            Ok(_) => None,
            Err(Error::ProbeFailed(err)) => {
                tracing::debug!(%err, "probe failed to send");
                None
            }
            Err(err) => return Err(err),
        };
        if let Some(latency_ms) = latency_ms {
            if first_sample {
                stats.min = latency_ms;
                stats.max = latency_ms;
                stats.sum = latency_ms;
                first_sample = false;
            } else {
                stats.min = stats.min.min(latency_ms);
                stats.max = stats.max.max(latency_ms);
                stats.sum += latency_ms;
            }
        } else {
            stats.lost += 1;
        }
        sequence = sequence.next();
    }
    stats.avg = stats.sum / f64::from(stats.count);
    Ok(stats)
}
