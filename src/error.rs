use std::net::Ipv4Addr;

/// Errors surfaced to a caller of the socket API.
///
/// Errors that arise from parsing or validating *inbound network* data are
/// never represented here. Those are silent drops handled entirely inside
/// the receive path and only ever visible through [`crate::Stats`].
#[derive(Debug, thiserror::Error)]
pub enum SwiftError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("address already in use")]
    AddressInUse,

    #[error("no ephemeral ports available")]
    OutOfMemory,

    #[error("sendmsg requires a target on an unconnected socket")]
    DestinationRequired,

    #[error("operation would block")]
    WouldBlock,

    #[error("no route to {0}")]
    RouteUnreachable(Ipv4Addr),

    #[error("operation not supported")]
    NotSupported,
}

pub type Result<T> = std::result::Result<T, SwiftError>;
