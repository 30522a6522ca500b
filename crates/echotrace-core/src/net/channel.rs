use crate::config::ProbeConfig;
use crate::error::{Error, Result};
use crate::net::socket::Socket;
use crate::probe::ProbeTimestamp;
use crate::types::{ProbeId, Sequence, TimeToLive};
use echotrace_packet::checksum::internet_checksum;
use echotrace_packet::icmpv4::destination_unreachable::DestinationUnreachablePacket;
use echotrace_packet::icmpv4::echo_reply::EchoReplyPacket;
use echotrace_packet::icmpv4::echo_request::EchoRequestPacket;
use echotrace_packet::icmpv4::time_exceeded::TimeExceededPacket;
use echotrace_packet::icmpv4::{IcmpCode, IcmpPacket, IcmpTimeExceededCode, IcmpType};
use echotrace_packet::ipv4::Ipv4Packet;
use echotrace_packet::IpProtocol;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::instrument;

/// The maximum size of the IP packet we allow.
pub const MAX_PACKET_SIZE: usize = 1024;

/// The maximum size of ICMP packet we allow.
const MAX_ICMP_PACKET_BUF: usize = MAX_PACKET_SIZE - Ipv4Packet::minimum_packet_size();

/// The maximum caller payload we allow, after the timestamp prefix.
const MAX_PAYLOAD_BUF: usize =
    MAX_ICMP_PACKET_BUF - IcmpPacket::minimum_packet_size() - ProbeTimestamp::SIZE;

/// A channel for sending echo requests and receiving ICMP replies.
///
/// A channel is scoped to a single probe attempt: it is created before the
/// attempt and dropped on every exit path, releasing both sockets, so option
/// state never carries over between attempts.
#[derive(Debug)]
pub struct Channel<S: Socket> {
    send_socket: S,
    recv_socket: S,
    src_addr: Ipv4Addr,
    dest_addr: Ipv4Addr,
    identifier: ProbeId,
    payload: Vec<u8>,
    includes_ip_header: bool,
    ttl: TimeToLive,
}

impl<S: Socket> Channel<S> {
    /// Create a channel for one probe attempt.
    ///
    /// This operation requires the `CAP_NET_RAW` capability on Linux unless
    /// the configuration selects unprivileged mode.
    #[instrument(skip_all, level = "trace")]
    pub fn connect(config: &ProbeConfig) -> Result<Self> {
        tracing::debug!(?config);
        if config.payload.len() > MAX_PAYLOAD_BUF {
            return Err(Error::BadConfig(format!(
                "payload of {} bytes exceeds the maximum of {MAX_PAYLOAD_BUF}",
                config.payload.len()
            )));
        }
        let raw = config.privilege_mode.includes_ip_header();
        let send_socket = S::new_icmp_send_socket(raw)?;
        let recv_socket = S::new_icmp_recv_socket(raw)?;
        Ok(Self::new(send_socket, recv_socket, config))
    }

    pub(crate) fn new(send_socket: S, recv_socket: S, config: &ProbeConfig) -> Self {
        Self {
            send_socket,
            recv_socket,
            src_addr: config.source_addr,
            dest_addr: config.target_addr,
            identifier: config.identifier,
            payload: config.payload.clone(),
            includes_ip_header: config.privilege_mode.includes_ip_header(),
            ttl: TimeToLive(1),
        }
    }

    /// Set the time-to-live for the next send.
    ///
    /// When the channel supplies the IPv4 header the ttl is written into the
    /// header at build time; otherwise it is applied to the socket, before
    /// the send proceeds.
    #[instrument(skip(self), level = "trace")]
    pub fn set_ttl(&mut self, ttl: TimeToLive) -> Result<()> {
        self.ttl = ttl;
        if !self.includes_ip_header {
            self.send_socket.set_ttl(u32::from(ttl.0))?;
        }
        Ok(())
    }

    /// Build and transmit a single echo request.
    #[instrument(skip(self), level = "trace")]
    pub fn send_probe(&mut self, sequence: Sequence, timestamp: ProbeTimestamp) -> Result<()> {
        let mut icmp_buf = [0_u8; MAX_ICMP_PACKET_BUF];
        let echo_request = self.make_echo_request(&mut icmp_buf, sequence, timestamp)?;
        let remote_addr = SocketAddr::new(IpAddr::V4(self.dest_addr), 0);
        if self.includes_ip_header {
            let mut ipv4_buf = [0_u8; MAX_PACKET_SIZE];
            let ipv4 = self.make_ipv4_packet(&mut ipv4_buf, echo_request.packet())?;
            self.send_socket.send_to(ipv4.packet(), remote_addr)?;
        } else {
            self.send_socket.send_to(echo_request.packet(), remote_addr)?;
        }
        Ok(())
    }

    /// Block until an ICMP reply arrives or the timeout elapses.
    ///
    /// Returns `None` on timeout, which is the expected outcome of a dropped
    /// or filtered probe and is distinct from a socket error.
    #[instrument(skip(self), level = "trace")]
    pub fn recv_probe(&mut self, timeout: Duration) -> Result<Option<Reply>> {
        if !self.recv_socket.is_readable(timeout)? {
            return Ok(None);
        }
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        let (bytes_read, from) = self.recv_socket.recv_from(&mut buf)?;
        let reply = self.parse_reply(&buf[..bytes_read], from);
        tracing::debug!(?reply);
        Ok(Some(reply))
    }

    /// Create an ICMP `EchoRequest` packet.
    ///
    /// The inner (ICMP) checksum is computed here; the outer (IP) checksum,
    /// when applicable, is computed afterwards in [`Self::make_ipv4_packet`].
    fn make_echo_request<'a>(
        &self,
        icmp_buf: &'a mut [u8],
        sequence: Sequence,
        timestamp: ProbeTimestamp,
    ) -> Result<EchoRequestPacket<'a>> {
        let mut payload_buf = [0_u8; MAX_ICMP_PACKET_BUF - IcmpPacket::minimum_packet_size()];
        let payload_size = ProbeTimestamp::SIZE + self.payload.len();
        payload_buf[..ProbeTimestamp::SIZE].copy_from_slice(&timestamp.encode());
        payload_buf[ProbeTimestamp::SIZE..payload_size].copy_from_slice(&self.payload);
        let packet_size = IcmpPacket::minimum_packet_size() + payload_size;
        let mut icmp = EchoRequestPacket::new(&mut icmp_buf[..packet_size])?;
        icmp.set_icmp_type(IcmpType::EchoRequest);
        icmp.set_icmp_code(IcmpCode(0));
        icmp.set_identifier(self.identifier.0);
        icmp.set_sequence(sequence.0);
        icmp.set_payload(&payload_buf[..payload_size]);
        icmp.set_checksum(internet_checksum(icmp.packet()));
        Ok(icmp)
    }

    /// Create an `Ipv4Packet` wrapping the given ICMP packet.
    fn make_ipv4_packet<'a>(
        &self,
        ipv4_buf: &'a mut [u8],
        payload: &[u8],
    ) -> Result<Ipv4Packet<'a>> {
        let total_length = Ipv4Packet::minimum_packet_size() + payload.len();
        let mut ipv4 = Ipv4Packet::new(&mut ipv4_buf[..total_length])?;
        ipv4.set_version(4);
        ipv4.set_header_length(5);
        ipv4.set_tos(0);
        ipv4.set_total_length(total_length as u16);
        ipv4.set_identification(0);
        ipv4.set_flags_and_fragment_offset(0);
        ipv4.set_ttl(self.ttl.0);
        ipv4.set_protocol(IpProtocol::Icmp);
        ipv4.set_source(self.src_addr);
        ipv4.set_destination(self.dest_addr);
        ipv4.set_payload(payload);
        ipv4.set_checksum(internet_checksum(ipv4.header()));
        Ok(ipv4)
    }

    /// Parse and classify a received datagram.
    ///
    /// Anything that is not a well formed echo reply, time exceeded or
    /// destination unreachable message is classified [`ReplyKind::Unrelated`]
    /// so the caller can keep waiting within its timeout budget.
    fn parse_reply(&self, buf: &[u8], from: Option<SocketAddr>) -> Reply {
        let (addr, icmp_start) = if self.includes_ip_header {
            match Ipv4Packet::new_view(buf) {
                Ok(ipv4) if ipv4.get_protocol() == IpProtocol::Icmp => {
                    let header_len = usize::from(ipv4.get_header_length()) * 4;
                    (ipv4.get_source(), header_len)
                }
                _ => return Reply::unrelated(from_addr(from)),
            }
        } else {
            (from_addr(from), 0)
        };
        if icmp_start > buf.len() {
            return Reply::unrelated(addr);
        }
        let icmp_bytes = &buf[icmp_start..];
        let Ok(icmp) = IcmpPacket::new_view(icmp_bytes) else {
            return Reply::unrelated(addr);
        };
        let kind = match icmp.get_icmp_type() {
            IcmpType::EchoReply => match EchoReplyPacket::new_view(icmp_bytes) {
                Ok(echo_reply) => ReplyKind::EchoReply {
                    identifier: echo_reply.get_identifier(),
                    sequence: echo_reply.get_sequence(),
                    timestamp: ProbeTimestamp::decode(echo_reply.payload()),
                },
                Err(_) => ReplyKind::Unrelated,
            },
            IcmpType::TimeExceeded => {
                if IcmpTimeExceededCode::from(icmp.get_icmp_code())
                    == IcmpTimeExceededCode::TtlExpired
                {
                    match TimeExceededPacket::new_view(icmp_bytes) {
                        Ok(packet) => ReplyKind::TimeExceeded {
                            original: extract_original_echo(packet.payload()),
                        },
                        Err(_) => ReplyKind::Unrelated,
                    }
                } else {
                    ReplyKind::Unrelated
                }
            }
            IcmpType::DestinationUnreachable => {
                match DestinationUnreachablePacket::new_view(icmp_bytes) {
                    Ok(packet) => ReplyKind::Unreachable {
                        original: extract_original_echo(packet.payload()),
                    },
                    Err(_) => ReplyKind::Unrelated,
                }
            }
            IcmpType::EchoRequest | IcmpType::Other(_) => ReplyKind::Unrelated,
        };
        Reply { addr, kind }
    }
}

/// A parsed and classified ICMP reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// The immediate sender of the reply.
    pub addr: Ipv4Addr,
    /// The classified reply.
    pub kind: ReplyKind,
}

impl Reply {
    const fn unrelated(addr: Ipv4Addr) -> Self {
        Self {
            addr,
            kind: ReplyKind::Unrelated,
        }
    }
}

/// The classified kind of a received ICMP reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// An echo reply from the target.
    EchoReply {
        identifier: u16,
        sequence: u16,
        /// The echoed send timestamp, absent for foreign payloads.
        timestamp: Option<ProbeTimestamp>,
    },
    /// The probe expired in transit.
    TimeExceeded {
        /// The identifiers of the embedded original echo request, when
        /// parseable.
        original: Option<EchoRef>,
    },
    /// The probe could not be delivered.
    Unreachable {
        /// The identifiers of the embedded original echo request, when
        /// parseable.
        original: Option<EchoRef>,
    },
    /// Traffic unrelated to this probe.
    Unrelated,
}

/// The identifying fields of an original echo request quoted by an ICMP
/// control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoRef {
    pub identifier: u16,
    pub sequence: u16,
}

/// Extract the original echo request from the invoking datagram quoted in an
/// ICMP control message.
fn extract_original_echo(invoking: &[u8]) -> Option<EchoRef> {
    let ipv4 = Ipv4Packet::new_view(invoking).ok()?;
    if ipv4.get_protocol() != IpProtocol::Icmp {
        return None;
    }
    let echo_request = EchoRequestPacket::new_view(ipv4.payload()).ok()?;
    if echo_request.get_icmp_type() != IcmpType::EchoRequest {
        return None;
    }
    Some(EchoRef {
        identifier: echo_request.get_identifier(),
        sequence: echo_request.get_sequence(),
    })
}

fn from_addr(from: Option<SocketAddr>) -> Ipv4Addr {
    match from {
        Some(SocketAddr::V4(addr)) => *addr.ip(),
        _ => Ipv4Addr::UNSPECIFIED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrivilegeMode;
    use crate::error::IoResult;
    use crate::mocket_recv_from;
    use crate::net::socket::MockSocket;
    use mockall::predicate;
    use std::str::FromStr;

    fn test_config(privilege_mode: PrivilegeMode) -> ProbeConfig {
        ProbeConfig {
            source_addr: Ipv4Addr::from_str("1.2.3.4").unwrap(),
            target_addr: Ipv4Addr::from_str("5.6.7.8").unwrap(),
            identifier: ProbeId(1234),
            privilege_mode,
            ..Default::default()
        }
    }

    fn test_timestamp() -> ProbeTimestamp {
        // 1_700_000_000s + 123_456us
        ProbeTimestamp::from_parts(1_700_000_000, 123_456)
    }

    #[test]
    fn test_send_probe_privileged() -> anyhow::Result<()> {
        let expected_send_to_buf = hex_literal::hex!(
            "
            45 00 00 2c 00 00 00 00 0a 01 a0 be 01 02 03 04
            05 06 07 08 08 00 27 fd 04 d2 82 9a 00 00 00 00
            65 53 f1 00 00 00 00 00 00 01 e2 40
            "
        );
        let expected_send_to_addr =
            SocketAddr::new(IpAddr::V4(Ipv4Addr::from_str("5.6.7.8")?), 0);
        let mut send_mocket = MockSocket::new();
        send_mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(expected_send_to_addr),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let recv_mocket = MockSocket::new();
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        channel.set_ttl(TimeToLive(10))?;
        channel.send_probe(Sequence(33434), test_timestamp())?;
        Ok(())
    }

    #[test]
    fn test_send_probe_unprivileged() -> anyhow::Result<()> {
        let expected_send_to_buf = hex_literal::hex!(
            "
            08 00 27 fd 04 d2 82 9a 00 00 00 00 65 53 f1 00
            00 00 00 00 00 01 e2 40
            "
        );
        let expected_send_to_addr =
            SocketAddr::new(IpAddr::V4(Ipv4Addr::from_str("5.6.7.8")?), 0);
        let mut send_mocket = MockSocket::new();
        send_mocket
            .expect_set_ttl()
            .with(predicate::eq(10_u32))
            .times(1)
            .returning(|_| Ok(()));
        send_mocket
            .expect_send_to()
            .with(
                predicate::eq(expected_send_to_buf),
                predicate::eq(expected_send_to_addr),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let recv_mocket = MockSocket::new();
        let config = test_config(PrivilegeMode::Unprivileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        channel.set_ttl(TimeToLive(10))?;
        channel.send_probe(Sequence(33434), test_timestamp())?;
        Ok(())
    }

    #[test]
    fn test_send_probe_checksums_verify() -> anyhow::Result<()> {
        // both the IP and ICMP layer checksums must validate on the built
        // packet, before it ever reaches a wire
        use echotrace_packet::checksum::verify_checksum;
        let mut send_mocket = MockSocket::new();
        send_mocket
            .expect_send_to()
            .withf(|buf, _| verify_checksum(&buf[..20]) && verify_checksum(&buf[20..]))
            .times(1)
            .returning(|_, _| Ok(()));
        let recv_mocket = MockSocket::new();
        let config = ProbeConfig {
            payload: b"a pirate's life for me".to_vec(),
            ..test_config(PrivilegeMode::Privileged)
        };
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        channel.set_ttl(TimeToLive(3))?;
        channel.send_probe(Sequence(7), test_timestamp())?;
        Ok(())
    }

    #[test]
    fn test_send_probe_oversized_payload() {
        let config = ProbeConfig {
            payload: vec![0_u8; MAX_PAYLOAD_BUF + 1],
            ..test_config(PrivilegeMode::Privileged)
        };
        let err = Channel::<MockSocket>::connect(&config).unwrap_err();
        assert!(matches!(err, Error::BadConfig(_)));
    }

    #[test]
    fn test_recv_probe_timeout() -> anyhow::Result<()> {
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(false));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?;
        assert_eq!(None, reply);
        Ok(())
    }

    #[test]
    fn test_recv_probe_echo_reply() -> anyhow::Result<()> {
        // echo reply from 5.6.7.8 with id 1234, seq 33434 and our timestamp
        let reply_buf = hex_literal::hex!(
            "
            45 00 00 2c 00 00 00 00 36 01 00 00 05 06 07 08
            01 02 03 04 00 00 2f fd 04 d2 82 9a 00 00 00 00
            65 53 f1 00 00 00 00 00 00 01 e2 40
            "
        );
        let from = SocketAddr::from_str("5.6.7.8:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(Ipv4Addr::from_str("5.6.7.8")?, reply.addr);
        assert_eq!(
            ReplyKind::EchoReply {
                identifier: 1234,
                sequence: 33434,
                timestamp: Some(test_timestamp()),
            },
            reply.kind
        );
        Ok(())
    }

    #[test]
    fn test_recv_probe_echo_reply_unprivileged() -> anyhow::Result<()> {
        // the datagram socket strips the IP header; the responder address
        // comes from the socket address instead
        let reply_buf = hex_literal::hex!(
            "
            00 00 2f fd 04 d2 82 9a 00 00 00 00 65 53 f1 00
            00 00 00 00 00 01 e2 40
            "
        );
        let from = SocketAddr::from_str("5.6.7.8:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Unprivileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(Ipv4Addr::from_str("5.6.7.8")?, reply.addr);
        assert!(matches!(reply.kind, ReplyKind::EchoReply { .. }));
        Ok(())
    }

    #[test]
    fn test_recv_probe_time_exceeded() -> anyhow::Result<()> {
        // time exceeded from router 10.0.0.1 quoting our echo request
        let reply_buf = hex_literal::hex!(
            "
            45 00 00 38 00 00 00 00 40 01 00 00 0a 00 00 01
            01 02 03 04 0b 00 00 00 00 00 00 00 45 00 00 2c
            00 00 00 00 01 01 00 00 01 02 03 04 05 06 07 08
            08 00 27 fd 04 d2 82 9a
            "
        );
        let from = SocketAddr::from_str("10.0.0.1:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(Ipv4Addr::from_str("10.0.0.1")?, reply.addr);
        assert_eq!(
            ReplyKind::TimeExceeded {
                original: Some(EchoRef {
                    identifier: 1234,
                    sequence: 33434,
                }),
            },
            reply.kind
        );
        Ok(())
    }

    #[test]
    fn test_recv_probe_destination_unreachable() -> anyhow::Result<()> {
        let reply_buf = hex_literal::hex!(
            "
            45 00 00 38 00 00 00 00 40 01 00 00 05 06 07 08
            01 02 03 04 03 01 00 00 00 00 00 00 45 00 00 2c
            00 00 00 00 01 01 00 00 01 02 03 04 05 06 07 08
            08 00 27 fd 04 d2 82 9a
            "
        );
        let from = SocketAddr::from_str("5.6.7.8:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(
            ReplyKind::Unreachable {
                original: Some(EchoRef {
                    identifier: 1234,
                    sequence: 33434,
                }),
            },
            reply.kind
        );
        Ok(())
    }

    #[test]
    fn test_recv_probe_unrelated() -> anyhow::Result<()> {
        // a UDP datagram is not ours
        let reply_buf = hex_literal::hex!(
            "
            45 00 00 1c 00 00 00 00 40 11 00 00 0a 00 00 01
            01 02 03 04 68 bf 81 b6 00 08 00 00
            "
        );
        let from = SocketAddr::from_str("10.0.0.1:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(ReplyKind::Unrelated, reply.kind);
        Ok(())
    }

    #[test]
    fn test_recv_probe_truncated() -> anyhow::Result<()> {
        let reply_buf = hex_literal::hex!("45 00");
        let from = SocketAddr::from_str("10.0.0.1:0")?;
        let send_mocket = MockSocket::new();
        let mut recv_mocket = MockSocket::new();
        recv_mocket
            .expect_is_readable()
            .times(1)
            .returning(|_| Ok(true));
        recv_mocket
            .expect_recv_from()
            .times(1)
            .returning(mocket_recv_from!(reply_buf, from));
        let config = test_config(PrivilegeMode::Privileged);
        let mut channel = Channel::new(send_mocket, recv_mocket, &config);
        let reply = channel.recv_probe(Duration::from_millis(10))?.unwrap();
        assert_eq!(ReplyKind::Unrelated, reply.kind);
        Ok(())
    }
}
