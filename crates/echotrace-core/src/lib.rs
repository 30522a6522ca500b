//! Echotrace - an ICMP network probing library.
//!
//! This crate provides the probing facility used by the standalone
//! `echotrace` application: wire-correct ICMP echo probes over raw (or
//! unprivileged datagram) sockets, with two session drivers built on top:
//!
//! - [`ping`] - repeated probes of a fixed destination, aggregating loss and
//!   latency statistics.
//! - [`traceroute`] - a time-to-live sweep which discovers the path to the
//!   destination hop by hop.
//!
//! Probing is strictly sequential and blocking: one probe is in flight at a
//! time and each attempt completes (reply, intermediate ICMP message or
//! timeout) before the next begins. Each probe acquires its own scoped
//! transport so socket option state never leaks between attempts.
//!
//! # Example
//!
//! The following example pings a target four times and prints the aggregate
//! statistics:
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! # use std::net::Ipv4Addr;
//! # use std::str::FromStr;
//! use echotrace_core::{ping, Engine, PingConfig, ProbeConfig};
//!
//! let config = ProbeConfig {
//!     target_addr: Ipv4Addr::from_str("1.1.1.1")?,
//!     ..Default::default()
//! };
//! let engine = Engine::new(config);
//! let stats = ping(&engine, &PingConfig::default())?;
//! println!("sent {} lost {}", stats.count, stats.lost);
//! # Ok(())
//! # }
//! ```

mod config;
mod engine;
mod error;
mod net;
mod ping;
mod probe;
mod trace;
mod types;

pub use config::{
    defaults, MatchPolicy, PingConfig, PrivilegeMode, ProbeConfig, TraceConfig,
};
#[cfg(unix)]
pub use engine::Engine;
pub use engine::{ProbeEngine, Prober};
pub use error::{Error, IoError, IoResult, Result};
pub use net::socket::Socket;
pub use ping::{ping, PingStatistics};
pub use probe::{ProbeOutcome, ProbeReport};
pub use trace::{traceroute, HopRecord};
pub use types::{MaxHops, ProbeId, Sequence, TimeToLive};
