use std::fmt::{Display, Formatter};
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// A probe error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A probe error.
#[derive(Error, Debug)]
pub enum Error {
    /// The reply packet could not be parsed or the probe packet could not be
    /// built.
    #[error("invalid packet: {0}")]
    PacketError(#[from] echotrace_packet::error::Error),
    /// The configuration is inconsistent.
    #[error("invalid config: {0}")]
    BadConfig(String),
    /// The transport could not be opened or configured.
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    /// A single probe failed to send.
    ///
    /// This is fatal for the attempt only; drivers count it as a lost probe
    /// and continue the session.
    #[error("probe failed to send: {0}")]
    ProbeFailed(IoError),
}

impl Error {
    /// Convert an [`Error::IoError`] of the given kind to [`Error::ProbeFailed`].
    #[must_use]
    pub(crate) fn probe_failed(self, kind: &ErrorKind) -> Self {
        match self {
            Self::IoError(io_err) if io_err.kind() == *kind => Self::ProbeFailed(io_err),
            err => err,
        }
    }
}

/// Custom IO error result.
pub type IoResult<T> = std::result::Result<T, IoError>;

/// Custom IO error.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("sendto error for {1}: {0}")]
    SendTo(io::Error, SocketAddr),
    #[error("failed to {1}: {0}")]
    Other(io::Error, IoOperation),
}

impl IoError {
    /// Get the custom error kind.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SendTo(e, _) | Self::Other(e, _) => ErrorKind::from(e),
        }
    }
}

/// Custom error kind.
///
/// This includes additional error kinds that are not part of the standard
/// [`io::ErrorKind`].
#[derive(Debug, Eq, PartialEq)]
pub enum ErrorKind {
    HostUnreachable,
    NetUnreachable,
    Std(io::ErrorKind),
}

impl From<&io::Error> for ErrorKind {
    fn from(value: &io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::HostUnreachable => Self::HostUnreachable,
            io::ErrorKind::NetworkUnreachable => Self::NetUnreachable,
            kind => Self::Std(kind),
        }
    }
}

impl From<ErrorKind> for io::Error {
    fn from(value: ErrorKind) -> Self {
        match value {
            ErrorKind::HostUnreachable => Self::from(io::ErrorKind::HostUnreachable),
            ErrorKind::NetUnreachable => Self::from(io::ErrorKind::NetworkUnreachable),
            ErrorKind::Std(kind) => Self::from(kind),
        }
    }
}

/// Io operation.
#[derive(Debug)]
pub enum IoOperation {
    NewSocket,
    SetNonBlocking,
    Select,
    RecvFrom,
    SetTtl,
    SetHeaderIncluded,
}

impl Display for IoOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewSocket => write!(f, "create new socket"),
            Self::SetNonBlocking => write!(f, "set non-blocking"),
            Self::Select => write!(f, "select"),
            Self::RecvFrom => write!(f, "recv from"),
            Self::SetTtl => write!(f, "set TTL"),
            Self::SetHeaderIncluded => write!(f, "set header included"),
        }
    }
}
