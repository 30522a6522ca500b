use thiserror::Error;

/// A packet error result.
pub type Result<T> = std::result::Result<T, Error>;

/// A packet error.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// Attempting to create a packet with an insufficient buffer size.
    #[error("buffer too small for {kind} packet: need {need} bytes, have {have}")]
    InsufficientPacketBuffer {
        kind: &'static str,
        need: usize,
        have: usize,
    },
}
