use clap::{ArgAction, Parser, ValueEnum};

/// Probe a network path with ICMP echo datagrams.
//
// The `-h` short flag belongs to `--host`, so the built-in help short flag is
// disabled and help is reachable via `--help` only.
#[derive(Parser, Debug)]
#[command(name = "echotrace", version, about, disable_help_flag = true)]
pub struct Args {
    /// The hostname or IPv4 address to probe
    #[arg(short = 'h', long)]
    pub host: String,

    /// The probe mode [default: trace]
    #[arg(value_enum, short = 'm', long)]
    pub mode: Option<Mode>,

    /// The reply timeout in milliseconds [default: 200]
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// The maximum number of hops [default: 64]
    #[arg(short = 'n', long)]
    pub max_hops: Option<u8>,

    /// The number of probes to send [default: 4, or 3 per hop when tracing]
    #[arg(short = 'c', long)]
    pub count: Option<u32>,

    /// Probe without requiring elevated privileges [default: false]
    #[arg(short = 'u', long)]
    pub unprivileged: bool,

    /// Only accept replies carrying our identifier and sequence number
    #[arg(long)]
    pub strict: bool,

    /// Enable verbose debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

/// The probe mode.
#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Repeatedly probe the target and summarise loss and latency.
    Ping,
    /// Discover the path to the target hop by hop.
    Trace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let args = Args::try_parse_from(["echotrace", "--host", "example.com"]).unwrap();
        assert_eq!("example.com", args.host);
        assert_eq!(None, args.mode);
        assert_eq!(None, args.timeout);
        assert!(!args.unprivileged);
        assert!(!args.strict);
    }

    #[test]
    fn test_parse_short_flags() {
        let args = Args::try_parse_from([
            "echotrace", "-h", "1.1.1.1", "-m", "ping", "-t", "500", "-n", "30", "-c", "10", "-u",
        ])
        .unwrap();
        assert_eq!("1.1.1.1", args.host);
        assert_eq!(Some(Mode::Ping), args.mode);
        assert_eq!(Some(500), args.timeout);
        assert_eq!(Some(30), args.max_hops);
        assert_eq!(Some(10), args.count);
        assert!(args.unprivileged);
    }

    #[test]
    fn test_parse_missing_host() {
        let err = Args::try_parse_from(["echotrace"]).unwrap_err();
        assert_eq!(clap::error::ErrorKind::MissingRequiredArgument, err.kind());
    }

    #[test]
    fn test_parse_strict() {
        let args =
            Args::try_parse_from(["echotrace", "--host", "example.com", "--strict"]).unwrap();
        assert!(args.strict);
    }
}
