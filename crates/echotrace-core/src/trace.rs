use crate::config::TraceConfig;
use crate::engine::Prober;
use crate::error::{Error, Result};
use crate::probe::{ProbeOutcome, ProbeReport};
use crate::types::{Sequence, TimeToLive};
use tracing::instrument;

/// The rows and aggregates recorded for a single hop.
///
/// One row is recorded per probe attempt at the hop's ttl; the latency
/// aggregates fold in incrementally, with the first sample seeding the
/// minimum and maximum.
#[derive(Debug, Clone, PartialEq)]
pub struct HopRecord {
    /// The ttl which identifies this hop.
    pub ttl: TimeToLive,
    /// One entry per probe attempt at this ttl.
    pub probes: Vec<ProbeReport>,
    lost: u32,
    samples: u32,
    best: f64,
    worst: f64,
    sum: f64,
}

impl HopRecord {
    fn new(ttl: TimeToLive) -> Self {
        Self {
            ttl,
            probes: Vec::new(),
            lost: 0,
            samples: 0,
            best: 0.0,
            worst: 0.0,
            sum: 0.0,
        }
    }

    /// Build a record from pre-collected probe reports.
    #[must_use]
    pub fn from_probes(ttl: TimeToLive, probes: Vec<ProbeReport>) -> Self {
        let mut hop = Self::new(ttl);
        for probe in probes {
            hop.record(probe);
        }
        hop
    }

    /// The number of probes attempted at this hop.
    #[must_use]
    pub fn sent(&self) -> u32 {
        self.probes.len() as u32
    }

    /// The number of probes which drew no reply at all.
    #[must_use]
    pub const fn lost(&self) -> u32 {
        self.lost
    }

    /// The smallest round trip observed at this hop, in milliseconds.
    #[must_use]
    pub const fn best_ms(&self) -> Option<f64> {
        if self.samples > 0 {
            Some(self.best)
        } else {
            None
        }
    }

    /// The largest round trip observed at this hop, in milliseconds.
    #[must_use]
    pub const fn worst_ms(&self) -> Option<f64> {
        if self.samples > 0 {
            Some(self.worst)
        } else {
            None
        }
    }

    /// The mean round trip over replies observed at this hop, in
    /// milliseconds.
    #[must_use]
    pub fn avg_ms(&self) -> Option<f64> {
        if self.samples > 0 {
            Some(self.sum / f64::from(self.samples))
        } else {
            None
        }
    }

    /// Whether any attempt at this hop was answered by the target itself.
    #[must_use]
    pub fn target_found(&self) -> bool {
        self.probes
            .iter()
            .any(|probe| probe.outcome == ProbeOutcome::EchoReply)
    }

    fn record(&mut self, report: ProbeReport) {
        if report.outcome == ProbeOutcome::TimedOut {
            self.lost += 1;
        }
        if let Some(latency_ms) = report.latency_ms() {
            if self.samples > 0 {
                self.best = self.best.min(latency_ms);
                self.worst = self.worst.max(latency_ms);
                self.sum += latency_ms;
            } else {
                self.best = latency_ms;
                self.worst = latency_ms;
                self.sum = latency_ms;
            }
            self.samples += 1;
        }
        self.probes.push(report);
    }
}

/// Discover the path to the target hop by hop.
///
/// Probes are issued at ttl 1, 2, 3, … until the target answers with an echo
/// reply or the hop budget is exhausted; the latter is a normal terminal
/// state meaning "destination not confirmed within the hop budget". The
/// sweep stops as soon as any attempt draws an echo reply. A lost probe at
/// one hop never prevents probing the next.
#[instrument(skip(prober), level = "trace")]
pub fn traceroute<P: Prober>(prober: &P, config: &TraceConfig) -> Result<Vec<HopRecord>> {
    if config.max_hops.0 == 0 {
        return Err(Error::BadConfig(String::from("max-hops must be non-zero")));
    }
    if config.probes_per_hop == 0 {
        return Err(Error::BadConfig(String::from(
            "probes-per-hop must be non-zero",
        )));
    }
    let mut hops: Vec<HopRecord> = Vec::new();
    let mut sequence = Sequence::default();
    for ttl in 1..=config.max_hops.0 {
        let mut hop = HopRecord::new(TimeToLive(ttl));
        for _ in 0..config.probes_per_hop {
            let report = match prober.probe(TimeToLive(ttl), sequence) {
                Ok(report) => report,
                Err(Error::ProbeFailed(err)) => {
                    tracing::debug!(%err, "probe failed to send");
                    ProbeReport::lost(TimeToLive(ttl))
                }
                Err(err) => return Err(err),
            };
            sequence = sequence.next();
            hop.record(report);
            if hop.target_found() {
                break;
            }
        }
        let target_found = hop.target_found();
        hops.push(hop);
        if target_found {
            tracing::debug!(ttl, "target found");
            break;
        }
    }
    Ok(hops)
}
