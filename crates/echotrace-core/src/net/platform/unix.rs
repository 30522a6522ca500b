use crate::error::{IoError, IoOperation, IoResult};
use crate::net::socket::Socket;
use nix::sys::select::FdSet;
use nix::sys::time::{TimeVal, TimeValLike};
use socket2::{Domain, Protocol, SockAddr, Type};
use std::io;
use std::net::SocketAddr;
use std::os::fd::AsFd;
use std::time::Duration;
use tracing::instrument;

/// A network socket backed by `socket2`.
///
/// All sockets are non-blocking; blocking-with-timeout receive semantics are
/// provided by the `select(2)` based [`Socket::is_readable`].
pub struct SocketImpl {
    inner: socket2::Socket,
}

impl SocketImpl {
    fn new(ty: Type) -> IoResult<Self> {
        Ok(Self {
            inner: socket2::Socket::new(Domain::IPV4, ty, Some(Protocol::ICMPV4))
                .map_err(|err| IoError::Other(err, IoOperation::NewSocket))?,
        })
    }

    fn set_nonblocking(&self, nonblocking: bool) -> IoResult<()> {
        self.inner
            .set_nonblocking(nonblocking)
            .map_err(|err| IoError::Other(err, IoOperation::SetNonBlocking))
    }

    fn set_header_included(&self, included: bool) -> IoResult<()> {
        self.inner
            .set_header_included(included)
            .map_err(|err| IoError::Other(err, IoOperation::SetHeaderIncluded))
    }
}

impl Socket for SocketImpl {
    #[instrument(level = "trace")]
    fn new_icmp_send_socket(raw: bool) -> IoResult<Self> {
        let socket = if raw {
            let socket = Self::new(Type::RAW)?;
            socket.set_header_included(true)?;
            socket
        } else {
            Self::new(Type::DGRAM)?
        };
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    #[instrument(level = "trace")]
    fn new_icmp_recv_socket(raw: bool) -> IoResult<Self> {
        let socket = if raw {
            Self::new(Type::RAW)?
        } else {
            Self::new(Type::DGRAM)?
        };
        socket.set_nonblocking(true)?;
        Ok(socket)
    }

    #[instrument(skip(self), level = "trace")]
    fn set_ttl(&mut self, ttl: u32) -> IoResult<()> {
        self.inner
            .set_ttl(ttl)
            .map_err(|err| IoError::Other(err, IoOperation::SetTtl))
    }

    #[instrument(skip(self, buf), level = "trace")]
    fn send_to(&mut self, buf: &[u8], addr: SocketAddr) -> IoResult<()> {
        tracing::trace!(len = buf.len(), ?addr);
        self.inner
            .send_to(buf, &SockAddr::from(addr))
            .map_err(|err| IoError::SendTo(err, addr))?;
        Ok(())
    }

    #[instrument(skip(self), level = "trace")]
    fn is_readable(&mut self, timeout: Duration) -> IoResult<bool> {
        let mut read = FdSet::new();
        read.insert(self.inner.as_fd());
        let mut timeout = TimeVal::milliseconds(timeout.as_millis() as i64);
        let readable =
            nix::sys::select::select(None, Some(&mut read), None, None, Some(&mut timeout));
        match readable {
            Ok(readable) => Ok(readable == 1),
            Err(nix::Error::EINTR) => Ok(false),
            Err(err) => Err(IoError::Other(io::Error::from(err), IoOperation::Select)),
        }
    }

    #[instrument(skip(self, buf), level = "trace")]
    fn recv_from(&mut self, buf: &mut [u8]) -> IoResult<(usize, Option<SocketAddr>)> {
        let (bytes_read, addr) = self
            .inner
            .recv_from_into_buf(buf)
            .map_err(|err| IoError::Other(err, IoOperation::RecvFrom))?;
        tracing::trace!(bytes_read, ?addr);
        Ok((bytes_read, addr))
    }
}

/// An extension trait to allow a `recv_from` which writes to a `&mut [u8]`.
///
/// This is required for `socket2::Socket` which [does not currently provide]
/// this method.
///
/// [does not currently provide]: https://github.com/rust-lang/socket2/issues/223
trait RecvFrom {
    fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)>;
}

impl RecvFrom for socket2::Socket {
    // Safety: the `recv` implementation promises not to write uninitialised
    // bytes to the `buf`fer, so this casting is safe.
    #![allow(unsafe_code)]
    fn recv_from_into_buf(&self, buf: &mut [u8]) -> io::Result<(usize, Option<SocketAddr>)> {
        let buf = unsafe {
            &mut *(std::ptr::from_mut::<[u8]>(buf) as *mut [std::mem::MaybeUninit<u8>])
        };
        self.recv_from(buf)
            .map(|(size, addr)| (size, addr.as_socket()))
    }
}
