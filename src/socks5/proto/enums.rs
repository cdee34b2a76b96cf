enum_builder! {
    /// Protocol version as defined by [RFC 1928].
    ///
    /// [RFC 1928]: https://datatracker.ietf.org/doc/html/rfc1928
    @U8
    pub enum ProtocolVersion {
        Socks5 => 0x05,
    }
}

enum_builder! {
    /// Socks5 Method as defined by [IANA SOCKS Methods]
    ///
    /// Only [`SocksMethod::NoAuthenticationRequired`] is ever offered by the gateway.
    ///
    /// [IANA SOCKS Methods]: https://www.iana.org/assignments/socks-methods/socks-methods.xhtml
    @U8
    pub enum SocksMethod {
        /// No authentication required.
        NoAuthenticationRequired => 0x00,
        /// Generic Security Services Application Program Interface
        GSSAPI => 0x01,
        /// Username/Password Authentication for SOCKS V5
        UsernamePassword => 0x02,
        /// No acceptable methods.
        ///
        /// If the selected METHOD (by the server) is X'FF', none of the methods listed by the
        /// client are acceptable, and the client MUST close the connection.
        NoAcceptableMethods => 0xFF,
    }
}

enum_builder! {
    /// Request Command.
    ///
    /// Reference: <https://datatracker.ietf.org/doc/html/rfc1928#section-4>
    @U8
    pub enum Command {
        /// Request the server to establish a connection on behalf of the client
        /// with the destination address.
        Connect => 0x01,
        /// Used in protocols which require the client to accept connections from the server.
        Bind => 0x02,
        /// Used to establish an association within
        /// the UDP relay process to handle UDP datagrams.
        UdpAssociate => 0x03,
    }
}

enum_builder! {
    /// Type of the address following it.
    ///
    /// Only used during encoding and decoding,
    /// but no use for the in-memory representation.
    ///
    /// Reference: <https://datatracker.ietf.org/doc/html/rfc1928>
    @U8
    pub enum AddressType {
        /// The address is a version-4 IP address, with a length of 4 octets.
        IpV4 => 0x01,
        /// The address is a length-prefixed (max 255 byte) domain name.
        DomainName => 0x03,
        /// The address is a version-6 IP address, with a length of 16 octets.
        IpV6 => 0x04,
    }
}

enum_builder! {
    /// Indicates success or failure as the reply to a client request.
    ///
    /// Reference: <https://datatracker.ietf.org/doc/html/rfc1928#section-6>
    @U8
    pub enum ReplyKind {
        Succeeded => 0x00,
        GeneralServerFailure => 0x01,
        ConnectionNotAllowed => 0x02,
        NetworkUnreachable => 0x03,
        HostUnreachable => 0x04,
        ConnectionRefused => 0x05,
        TtlExpired => 0x06,
        CommandNotSupported => 0x07,
        AddressTypeNotSupported => 0x08,
    }
}

impl From<&std::io::Error> for ReplyKind {
    fn from(err: &std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::ConnectionNotAllowed,
            std::io::ErrorKind::HostUnreachable => Self::HostUnreachable,
            std::io::ErrorKind::NetworkUnreachable => Self::NetworkUnreachable,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::UnexpectedEof => Self::TtlExpired,
            _ => Self::ConnectionRefused,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_kind_display() {
        assert_eq!(ReplyKind::ConnectionRefused.to_string(), "ConnectionRefused (0x05)");
        assert_eq!(ReplyKind::from(0x42).to_string(), "Unknown (0x42)");
    }

    #[test]
    fn test_reply_kind_from_io_error() {
        let err = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        assert_eq!(ReplyKind::from(&err), ReplyKind::ConnectionRefused);
        let err = std::io::Error::from(std::io::ErrorKind::TimedOut);
        assert_eq!(ReplyKind::from(&err), ReplyKind::TtlExpired);
    }
}
