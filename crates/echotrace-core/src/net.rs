/// The transport channel.
pub mod channel;

/// The platform socket implementation.
pub mod platform;

/// The abstract socket.
pub mod socket;
