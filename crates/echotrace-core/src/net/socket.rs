use crate::error::IoResult;
use std::net::SocketAddr;
use std::time::Duration;

/// A socket for sending and receiving ICMP datagrams.
///
/// The socket is created per probe attempt and released when dropped, so
/// option state (ttl, timeout) never leaks between attempts.
#[cfg_attr(test, mockall::automock)]
pub trait Socket
where
    Self: Sized,
{
    /// Create a socket for sending ICMP probes.
    ///
    /// A raw socket has `IP_HDRINCL` set and expects the caller to provide
    /// the IPv4 header; a non-raw socket is an unprivileged ICMP datagram
    /// socket for which the OS supplies the header.
    fn new_icmp_send_socket(raw: bool) -> IoResult<Self>;
    /// Create a socket for receiving ICMP replies.
    fn new_icmp_recv_socket(raw: bool) -> IoResult<Self>;
    /// Set the time-to-live for outgoing datagrams.
    fn set_ttl(&mut self, ttl: u32) -> IoResult<()>;
    /// Send a whole datagram.
    ///
    /// A datagram send is atomic; any failure is total, there is no partial
    /// success to report.
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()>;
    /// Returns true if the socket becomes readable before the timeout,
    /// false otherwise.
    fn is_readable(&mut self, timeout: Duration) -> IoResult<bool>;
    /// Receive a whole datagram and the address it was sent from.
    fn recv_from(&mut self, buf: &mut [u8]) -> IoResult<(usize, Option<SocketAddr>)>;
}
