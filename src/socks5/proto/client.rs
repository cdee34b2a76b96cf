//! Client messages of the SOCKS5 Protocol [RFC 1928]
//!
//! [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928

use super::{
    Command, ProtocolError, ProtocolVersion, SocksMethod,
    common::{address_length, read_address, write_address_to_buf},
};
use crate::address::HostWithPort;
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, PartialEq, Eq)]
/// The client connects to the server, and sends a header which
/// contains the protocol version desired and SOCKS methods supported by the client.
///
/// ```plain
/// +-----+----------+----------+
/// | VER | NMETHODS | METHODS  |
/// +-----+----------+----------+
/// |  1  |    1     | 1 to 255 |
/// +-----+----------+----------+
/// ```
pub struct Header {
    pub version: ProtocolVersion,
    pub methods: Vec<SocksMethod>,
}

impl Header {
    /// Create a new socks5 [`Header`] offering the given methods.
    #[must_use]
    pub fn new(methods: impl Into<Vec<SocksMethod>>) -> Self {
        Self {
            version: ProtocolVersion::Socks5,
            methods: methods.into(),
        }
    }

    /// Read the client [`Header`], decoded from binary format as specified by [RFC 1928] from the reader.
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

        let number_methods = r.read_u8().await?;
        if number_methods == 0 {
            return Err(ProtocolError::UnexpectedByte { pos: 1, byte: 0 });
        }
        let mut raw = vec![0u8; number_methods as usize];
        r.read_exact(&mut raw).await?;

        Ok(Self {
            version,
            methods: raw.into_iter().map(Into::into).collect(),
        })
    }

    /// Write the client [`Header`] in binary format as specified by [RFC 1928] into the writer.
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

    /// Write the client [`Header`] in binary format as specified by [RFC 1928] into the buffer.
    ///
    /// At most 255 methods are written.
    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        let methods = &self.methods[..self.methods.len().min(u8::MAX as usize)];
        buf.put_u8(self.version.into());
        #[allow(clippy::cast_possible_truncation)]
        buf.put_u8(methods.len() as u8);
        for method in methods {
            buf.put_u8((*method).into());
        }
    }

    fn serialized_len(&self) -> usize {
        2 + self.methods.len().min(u8::MAX as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The SOCKS request, sent once method negotiation is complete.
///
/// ```plain
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub struct Request {
    pub version: ProtocolVersion,
    pub command: Command,
    pub destination: HostWithPort,
}

impl Request {
    /// Create a new socks5 [`Request`] for the given command and destination.
    #[must_use]
    pub fn new(command: Command, destination: HostWithPort) -> Self {
        Self {
            version: ProtocolVersion::Socks5,
            command,
            destination,
        }
    }

    /// Read the client [`Request`], decoded from binary format as specified by [RFC 1928] from the reader.
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

        let command: Command = r.read_u8().await?.into();

        let rsv = r.read_u8().await?;
        if rsv != 0 {
            return Err(ProtocolError::UnexpectedByte { pos: 2, byte: rsv });
        }

        let destination = read_address(r, 3).await?;

        Ok(Self {
            version,
            command,
            destination,
        })
    }

    /// Write the client [`Request`] in binary format as specified by [RFC 1928] into the writer.
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

    /// Write the client [`Request`] in binary format as specified by [RFC 1928] into the buffer.
    pub fn write_to_buf<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(self.version.into());
        buf.put_u8(self.command.into());
        buf.put_u8(0 /* RSV */);
        write_address_to_buf(&self.destination, buf);
    }

    fn serialized_len(&self) -> usize {
        3 + address_length(&self.destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Host;

    #[tokio::test]
    async fn test_read_header() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"\x05\x02\x00\x02")
            .build();
        let header = Header::read_from(&mut stream).await.unwrap();
        assert_eq!(
            header,
            Header::new([SocksMethod::NoAuthenticationRequired, SocksMethod::UsernamePassword])
        );
    }

    #[tokio::test]
    async fn test_read_header_unknown_version() {
        let mut stream = tokio_test::io::Builder::new().read(b"\x04").build();
        let err = Header::read_from(&mut stream).await.unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnexpectedByte { pos: 0, byte: 4 }
        ));
    }

    #[tokio::test]
    async fn test_read_connect_request_domain() {
        let mut stream = tokio_test::io::Builder::new()
            .read(b"\x05\x01\x00\x03\x0bexample.com\x01\xbb")
            .build();
        let request = Request::read_from(&mut stream).await.unwrap();
        assert_eq!(request.command, Command::Connect);
        assert_eq!(
            request.destination,
            HostWithPort::new(Host::Name("example.com".to_owned()), 443)
        );
    }

    #[test]
    fn test_write_connect_request_ipv4() {
        let request = Request::new(Command::Connect, "10.0.0.1:8080".parse().unwrap());
        let mut buf = BytesMut::new();
        request.write_to_buf(&mut buf);
        assert_eq!(&buf[..], b"\x05\x01\x00\x01\x0a\x00\x00\x01\x1f\x90");
        assert_eq!(buf.len(), request.serialized_len());
    }

    #[test]
    fn test_serialized_len_matches_encoding() {
        for destination in ["example.com:443", "[::1]:8080", "127.0.0.1:80"] {
            let request = Request::new(Command::Connect, destination.parse().unwrap());
            let mut buf = BytesMut::new();
            request.write_to_buf(&mut buf);
            assert_eq!(buf.len(), request.serialized_len(), "{destination}");
        }
    }
}
