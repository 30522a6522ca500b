use crate::types::{MaxHops, ProbeId, TimeToLive};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default values for configuration.
pub mod defaults {
    use crate::config::{MatchPolicy, PrivilegeMode};
    use std::time::Duration;

    /// The default value for `privilege-mode`.
    pub const DEFAULT_PRIVILEGE_MODE: PrivilegeMode = PrivilegeMode::Privileged;

    /// The default value for `match-policy`.
    pub const DEFAULT_MATCH_POLICY: MatchPolicy = MatchPolicy::Loose;

    /// The default value for `timeout`.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

    /// The default value for `count`.
    pub const DEFAULT_PING_COUNT: u32 = 4;

    /// The ttl used for ping probes.
    pub const DEFAULT_PING_TTL: u8 = u8::MAX;

    /// The default value for `max-hops`.
    pub const DEFAULT_MAX_HOPS: u8 = 64;

    /// The default value for `probes-per-hop`.
    pub const DEFAULT_PROBES_PER_HOP: u32 = 3;
}

/// The privilege mode.
///
/// Privileged mode builds the full IPv4 header over a raw socket; unprivileged
/// mode sends bare ICMP packets over a datagram socket and leaves the IP
/// header to the OS. The two modes differ on the wire and on receive, see
/// [`PrivilegeMode::includes_ip_header`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PrivilegeMode {
    /// Privileged mode.
    Privileged,
    /// Unprivileged mode.
    Unprivileged,
}

impl PrivilegeMode {
    /// Whether sent and received datagrams carry the IPv4 header.
    ///
    /// Both send-side packet sizing and receive-side parsing key off this.
    #[must_use]
    pub const fn includes_ip_header(self) -> bool {
        match self {
            Self::Privileged => true,
            Self::Unprivileged => false,
        }
    }
}

impl Display for PrivilegeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Privileged => write!(f, "privileged"),
            Self::Unprivileged => write!(f, "unprivileged"),
        }
    }
}

/// The reply matching policy.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MatchPolicy {
    /// Correlate replies by the embedded timestamp alone.
    Loose,
    /// Additionally require the probe identifier and sequence number.
    ///
    /// Replies which fail the check are skipped and the probe keeps waiting
    /// within the remaining timeout budget.
    Strict,
}

impl Display for MatchPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loose => write!(f, "loose"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

/// Configuration for a single probe attempt.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProbeConfig {
    /// The source address, `0.0.0.0` to let the OS choose.
    pub source_addr: Ipv4Addr,
    /// The resolved target address.
    pub target_addr: Ipv4Addr,
    /// The ICMP echo identifier for this process.
    pub identifier: ProbeId,
    /// How long to wait for a reply before declaring the probe lost.
    pub timeout: Duration,
    /// Raw socket vs datagram socket transport.
    pub privilege_mode: PrivilegeMode,
    /// Reply matching policy.
    pub match_policy: MatchPolicy,
    /// Caller payload, carried after the timestamp prefix.
    pub payload: Vec<u8>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            source_addr: Ipv4Addr::UNSPECIFIED,
            target_addr: Ipv4Addr::UNSPECIFIED,
            identifier: ProbeId(0),
            timeout: defaults::DEFAULT_TIMEOUT,
            privilege_mode: defaults::DEFAULT_PRIVILEGE_MODE,
            match_policy: defaults::DEFAULT_MATCH_POLICY,
            payload: Vec::new(),
        }
    }
}

/// Configuration for a ping session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PingConfig {
    /// The number of probes to send.
    pub count: u32,
    /// The ttl for every probe.
    pub ttl: TimeToLive,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            count: defaults::DEFAULT_PING_COUNT,
            ttl: TimeToLive(defaults::DEFAULT_PING_TTL),
        }
    }
}

/// Configuration for a traceroute sweep.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TraceConfig {
    /// The hop budget.
    pub max_hops: MaxHops,
    /// The number of probes issued at each ttl.
    pub probes_per_hop: u32,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_hops: MaxHops(defaults::DEFAULT_MAX_HOPS),
            probes_per_hop: defaults::DEFAULT_PROBES_PER_HOP,
        }
    }
}
