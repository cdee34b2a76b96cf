//! Implementation of the SOCKS5 Protocol [RFC 1928]
//!
//! Only the parts needed to tunnel a tcp connection are implemented:
//! method negotiation without authentication and the `CONNECT` command.
//!
//! [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928

pub mod client;
pub mod server;

mod common;

mod enums;
pub use enums::{AddressType, Command, ProtocolVersion, ReplyKind, SocksMethod};

use crate::error::OpaqueError;
use std::fmt;

#[derive(Debug)]
/// Failure to read a SOCKS5 message.
pub enum ProtocolError {
    /// An I/O Error during reading or writing of data from I/O.
    IO(std::io::Error),
    /// Unexpected byte at the paired position
    UnexpectedByte { pos: usize, byte: u8 },
    /// Unexpected error happened
    Unexpected(OpaqueError),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IO(_) => write!(f, "protocol error: I/O"),
            Self::UnexpectedByte { pos, byte } => {
                write!(
                    f,
                    "protocol error: unexpected byte x'{byte:x}' at position {pos}"
                )
            }
            Self::Unexpected(_) => write!(f, "protocol error: unexpected"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IO(err) => Some(err),
            Self::UnexpectedByte { .. } => None,
            Self::Unexpected(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(value: std::io::Error) -> Self {
        Self::IO(value)
    }
}

impl From<OpaqueError> for ProtocolError {
    fn from(value: OpaqueError) -> Self {
        Self::Unexpected(value)
    }
}
