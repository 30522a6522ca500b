use std::net::{Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use thiserror::Error as ThisError;
use tracing::instrument;

/// A DNS resolver error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A DNS resolver error.
#[derive(ThisError, Debug)]
pub enum Error {
    /// The hostname could not be resolved.
    ///
    /// This is fatal to the whole probing operation: without an address
    /// there is nothing to probe.
    #[error("failed to resolve {0}")]
    LookupFailed(String),
}

/// A forward DNS resolver.
pub trait Resolver {
    /// Perform a blocking DNS hostname lookup and return the first resolved
    /// IPv4 address.
    ///
    /// A numeric IPv4 literal resolves to itself without a lookup.
    fn lookup(&self, hostname: &str) -> Result<Ipv4Addr>;
}

/// A forward DNS resolver backed by the system resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

impl DnsResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Resolver for DnsResolver {
    #[instrument(skip(self), ret, level = "trace")]
    fn lookup(&self, hostname: &str) -> Result<Ipv4Addr> {
        if let Ok(addr) = Ipv4Addr::from_str(hostname) {
            return Ok(addr);
        }
        // the system resolver wants a port; any value will do
        let addrs = (hostname, 0_u16)
            .to_socket_addrs()
            .map_err(|_| Error::LookupFailed(hostname.to_string()))?;
        addrs
            .filter_map(|addr| match addr {
                SocketAddr::V4(addr) => Some(*addr.ip()),
                SocketAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| Error::LookupFailed(hostname.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_numeric() {
        let resolver = DnsResolver::new();
        let addr = resolver.lookup("192.0.2.1").unwrap();
        assert_eq!(Ipv4Addr::new(192, 0, 2, 1), addr);
    }

    #[test]
    fn test_lookup_localhost() {
        let resolver = DnsResolver::new();
        let addr = resolver.lookup("localhost").unwrap();
        assert!(addr.is_loopback());
    }

    #[test]
    fn test_lookup_invalid() {
        let resolver = DnsResolver::new();
        let err = resolver.lookup("invalid.invalid.").unwrap_err();
        assert!(matches!(err, Error::LookupFailed(_)));
    }
}
