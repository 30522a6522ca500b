//! A blocking forward DNS resolver for network probing.
//!
//! The probing core only ever operates on resolved numeric addresses; this
//! crate is the collaborator which turns a hostname into one. Resolution is
//! IPv4 only, matching the scope of the prober.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use echotrace_dns::{DnsResolver, Resolver};
//!
//! let resolver = DnsResolver::new();
//! let addr = resolver.lookup("example.com")?;
//! println!("resolved to {addr}");
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod resolver;

pub use resolver::{DnsResolver, Error, Resolver, Result};
