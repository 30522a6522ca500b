use crate::cmd::{Args, Mode};
use crate::report;
use echotrace_core::{
    defaults, ping, traceroute, Engine, MatchPolicy, MaxHops, PingConfig, PrivilegeMode,
    ProbeConfig, ProbeId, TimeToLive, TraceConfig,
};
use echotrace_dns::{DnsResolver, Resolver};
use std::net::Ipv4Addr;
use std::process;
use std::time::Duration;

/// Run the echotrace application.
pub fn run(args: &Args) -> anyhow::Result<()> {
    configure_logging(args.verbose);
    let resolver = DnsResolver::new();
    let target_addr = resolver.lookup(&args.host)?;
    tracing::debug!(%target_addr, "resolved target");
    let engine = Engine::new(make_probe_config(args, target_addr)?);
    match args.mode.unwrap_or(Mode::Trace) {
        Mode::Ping => {
            let config = PingConfig {
                count: args.count.unwrap_or(defaults::DEFAULT_PING_COUNT),
                ttl: TimeToLive(defaults::DEFAULT_PING_TTL),
            };
            println!("Pinging {} ({})", args.host, target_addr);
            let stats = ping(&engine, &config)?;
            println!("{}", report::ping_table(engine.config().timeout, &stats));
        }
        Mode::Trace => {
            let config = TraceConfig {
                max_hops: MaxHops(args.max_hops.unwrap_or(defaults::DEFAULT_MAX_HOPS)),
                probes_per_hop: args.count.unwrap_or(defaults::DEFAULT_PROBES_PER_HOP),
            };
            println!("Tracing to {} ({})", args.host, target_addr);
            let hops = traceroute(&engine, &config)?;
            println!("{}", report::trace_table(&hops));
            if hops.last().is_some_and(echotrace_core::HopRecord::target_found) {
                println!("Destination reached in {} hops", hops.len());
            } else {
                println!("Destination not confirmed within {} hops", hops.len());
            }
        }
    }
    Ok(())
}

fn make_probe_config(args: &Args, target_addr: Ipv4Addr) -> anyhow::Result<ProbeConfig> {
    let identifier = ProbeId(u16::try_from(process::id() % u32::from(u16::MAX))?);
    Ok(ProbeConfig {
        source_addr: Ipv4Addr::UNSPECIFIED,
        target_addr,
        identifier,
        timeout: args
            .timeout
            .map_or(defaults::DEFAULT_TIMEOUT, Duration::from_millis),
        privilege_mode: if args.unprivileged {
            PrivilegeMode::Unprivileged
        } else {
            PrivilegeMode::Privileged
        },
        match_policy: if args.strict {
            MatchPolicy::Strict
        } else {
            MatchPolicy::Loose
        },
        payload: Vec::new(),
    })
}

fn configure_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    let default_directive = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_make_probe_config() {
        let args = Args::try_parse_from([
            "echotrace", "-h", "1.1.1.1", "-t", "500", "-u", "--strict",
        ])
        .unwrap();
        let config = make_probe_config(&args, Ipv4Addr::new(1, 1, 1, 1)).unwrap();
        assert_eq!(Ipv4Addr::new(1, 1, 1, 1), config.target_addr);
        assert_eq!(Duration::from_millis(500), config.timeout);
        assert_eq!(PrivilegeMode::Unprivileged, config.privilege_mode);
        assert_eq!(MatchPolicy::Strict, config.match_policy);
    }

    #[test]
    fn test_make_probe_config_defaults() {
        let args = Args::try_parse_from(["echotrace", "-h", "1.1.1.1"]).unwrap();
        let config = make_probe_config(&args, Ipv4Addr::new(1, 1, 1, 1)).unwrap();
        assert_eq!(defaults::DEFAULT_TIMEOUT, config.timeout);
        assert_eq!(PrivilegeMode::Privileged, config.privilege_mode);
        assert_eq!(MatchPolicy::Loose, config.match_policy);
    }
}
