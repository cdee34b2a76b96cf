//! Server messages of the SOCKS5 Protocol [RFC 1928]
//!
//! [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928

use super::{
    ProtocolError, ProtocolVersion, ReplyKind, SocksMethod,
    common::{address_length, read_address, write_address_to_buf},
};
use crate::address::{Host, HostWithPort};
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
/// The server selects from one of the methods given in METHODS, and
/// sends a header back containing the selected METHOD and same Protocol version.
///
/// ```plain
/// +-----+--------+
/// | VER | METHOD |
/// +-----+--------+
/// |  1  |   1    |
/// +-----+--------+
/// ```
pub struct Header {
    pub version: ProtocolVersion,
    pub method: SocksMethod,
}

impl Header {
    /// Create a new socks5 [`Header`] selecting the given method.
    #[must_use]
    pub fn new(method: SocksMethod) -> Self {
        Self {
            version: ProtocolVersion::Socks5,
            method,
        }
    }

    /// Read the server [`Header`], decoded from binary format as specified by [RFC 1928] from the reader.
    ///
    /// [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928
    pub async fn read_from<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let version: ProtocolVersion = r.read_u8().await?.into();
        if let ProtocolVersion::Unknown(version) = version {
            return Err(ProtocolError::UnexpectedByte {
                pos: 0,
                byte: version,
            });
        }

        let method: SocksMethod = r.read_u8().await?.into();

        Ok(Self { version, method })
    }

    /// Write the server [`Header`] in binary format as specified by [RFC 1928] into the writer.
    pub async fn write_to<W>(&self, w: &mut W) -> Result<(), std::io::Error>
    where
        W: AsyncWrite + Unpin,
    {
        w.write_all(&[self.version.into(), self.method.into()]).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Sent by the server as a reply on an earlier client request.
///
/// ```plain
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub struct Reply {
    pub version: ProtocolVersion,
    pub reply: ReplyKind,
    pub bind_address: HostWithPort,
}

impl Reply {
    /// Create a new [`Reply`] indicating success,
    /// with the address the server bound for the connection.
    #[must_use]
    pub fn new(bind_address: HostWithPort) -> Self {
        Self {
            version: ProtocolVersion::Socks5,
            reply: ReplyKind::Succeeded,
            bind_address,
        }
    }

    /// Create a new [`Reply`] indicating failure.
    #[must_use]
    pub fn error_reply(kind: ReplyKind) -> Self {
        Self {
            version: ProtocolVersion::Socks5,
            reply: kind,
            bind_address: HostWithPort::new(Host::Address(Ipv4Addr::UNSPECIFIED.into()), 0),
        }
    }

    /// Read the server [`Reply`], decoded from binary format as specified by [RFC 1928] from the reader.
    ///
    /// [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928
    pub async fn read_from<R>(r: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let version: ProtocolVersion = r.read_u8().await?.into();
        if let ProtocolVersion::Unknown(version) = version {
            return Err(ProtocolError::UnexpectedByte {
                pos: 0,
                byte: version,
            });
        }

        let reply: ReplyKind = r.read_u8().await?.into();

        let rsv = r.read_u8().await?;
        if rsv != 0 {
            return Err(ProtocolError::UnexpectedByte { pos: 2, byte: rsv });
        }

        let bind_address = read_address(r, 3).await?;

        Ok(Self {
            version,
            reply,
            bind_address,
        })
    }

    /// Write the server [`Reply`] in binary format as specified by [RFC 1928] into the writer.
    ///
    /// [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928
    pub async fn write_to<W>(&self, w: &mut W) -> Result<(), std::io::Error>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.write_to_buf(&mut buf);
        w.write_all(&buf).await
    }

    /// Write the server [`Reply`] in binary format as specified by [RFC 1928] into the buffer.
    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version.into());
        buf.put_u8(self.reply.into());
        buf.put_u8(0 /* RSV */);
        write_address_to_buf(&self.bind_address, buf);
    }

    fn serialized_len(&self) -> usize {
        3 + address_length(&self.bind_address)
    }
}
