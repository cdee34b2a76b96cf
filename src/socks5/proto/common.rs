use super::{AddressType, ProtocolError};
use crate::{
    address::{Host, HostWithPort},
    error::ErrorContext,
};
use bytes::BufMut;
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Encoded size of `address`: type byte, host and port.
pub(super) fn address_length(address: &HostWithPort) -> usize {
    1 + 2 + match &address.host {
        Host::Name(name) => 1 + name.len(),
        Host::Address(IpAddr::V4(_)) => 4,
        Host::Address(IpAddr::V6(_)) => 16,
    }
}

pub(super) async fn read_address<R: AsyncRead + Unpin>(
    r: &mut R,
    pos: usize,
) -> Result<HostWithPort, ProtocolError> {
    let address_type: AddressType = r.read_u8().await?.into();
    let host = match address_type {
        AddressType::IpV4 => {
            let mut array = [0u8; 4];
            r.read_exact(&mut array).await?;
            Host::Address(IpAddr::from(array))
        }
        AddressType::DomainName => {
            let n = r.read_u8().await?;
            if n == 0 {
                return Err(ProtocolError::UnexpectedByte {
                    pos: pos + 1,
                    byte: n,
                });
            }
            let mut raw = vec![0u8; n as usize];
            r.read_exact(&mut raw).await?;
            let name = String::from_utf8(raw).context("domain name is not utf-8")?;
            Host::try_from(name.as_str())?
        }
        AddressType::IpV6 => {
            let mut array = [0u8; 16];
            r.read_exact(&mut array).await?;
            Host::Address(IpAddr::from(array))
        }
        AddressType::Unknown(b) => {
            return Err(ProtocolError::UnexpectedByte { pos, byte: b });
        }
    };
    let port = r.read_u16().await?;

    Ok(HostWithPort::new(host, port))
}

pub(super) fn write_address_to_buf<B: BufMut>(address: &HostWithPort, buf: &mut B) {
    match &address.host {
        Host::Name(name) => {
            buf.put_u8(AddressType::DomainName.into());
            debug_assert!(name.len() <= crate::address::MAX_DOMAIN_LEN);
            #[allow(clippy::cast_possible_truncation)]
            buf.put_u8(name.len() as u8);
            buf.put_slice(name.as_bytes());
        }
        Host::Address(IpAddr::V4(addr)) => {
            buf.put_u8(AddressType::IpV4.into());
            buf.put_slice(&addr.octets());
        }
        Host::Address(IpAddr::V6(addr)) => {
            buf.put_u8(AddressType::IpV6.into());
            buf.put_slice(&addr.octets());
        }
    }
    buf.put_u16(address.port);
}
