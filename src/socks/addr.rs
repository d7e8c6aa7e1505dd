//! The SOCKS5 address codec.
//!
//! An [`AddrSpec`] is the tagged address used in request and reply bodies:
//! an IPv4/IPv6 address or a domain name, plus a port. After parsing exactly
//! one of `ip`/`fqdn` is populated; after resolution both may be, with
//! `fqdn` keeping the name the client sent and `ip` holding the resolved
//! address.

use crate::error::ProxyError;
use crate::socks::consts::*;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

/// A destination or bind address in SOCKS5 terms.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AddrSpec {
    /// Domain name, when the client sent one.
    pub fqdn: Option<String>,
    /// IP address, literal or resolved.
    pub ip: Option<IpAddr>,
    /// Port, host byte order.
    pub port: u16,
}

impl AddrSpec {
    /// An address from an IP and port.
    pub fn from_ip(ip: IpAddr, port: u16) -> Self {
        AddrSpec {
            fqdn: None,
            ip: Some(ip),
            port,
        }
    }

    /// An address from a domain name and port.
    pub fn from_domain(fqdn: impl Into<String>, port: u16) -> Self {
        AddrSpec {
            fqdn: Some(fqdn.into()),
            ip: None,
            port,
        }
    }

    /// `host:port` suitable for an outbound dial. Prefers the IP when one
    /// is present, so a resolved request dials the resolved address.
    pub fn address(&self) -> String {
        match (self.ip, &self.fqdn) {
            (Some(ip), _) => SocketAddr::new(ip, self.port).to_string(),
            (None, Some(fqdn)) => format!("{}:{}", fqdn, self.port),
            (None, None) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port).to_string(),
        }
    }

    /// Decode an address body: one type byte, the type-dependent address
    /// bytes, then a big-endian port.
    pub async fn read_from<R>(r: &mut R) -> Result<Self, ProxyError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let atyp = r.read_u8().await?;
        let mut spec = match atyp {
            ATYP_IPV4 => {
                let mut octets = [0u8; 4];
                r.read_exact(&mut octets).await?;
                AddrSpec::from_ip(IpAddr::V4(Ipv4Addr::from(octets)), 0)
            }
            ATYP_IPV6 => {
                let mut octets = [0u8; 16];
                r.read_exact(&mut octets).await?;
                AddrSpec::from_ip(IpAddr::V6(Ipv6Addr::from(octets)), 0)
            }
            ATYP_FQDN => {
                let len = r.read_u8().await? as usize;
                if len == 0 {
                    return Err(ProxyError::Protocol("empty domain name".into()));
                }
                let mut name = vec![0u8; len];
                r.read_exact(&mut name).await?;
                let fqdn = String::from_utf8(name)
                    .map_err(|_| ProxyError::Protocol("domain name is not valid UTF-8".into()))?;
                AddrSpec::from_domain(fqdn, 0)
            }
            other => return Err(ProxyError::UnrecognizedAddrType(other)),
        };
        spec.port = r.read_u16().await?;
        Ok(spec)
    }

    /// Encode for a reply body. Emits whichever of IPv4/IPv6/FQDN is set;
    /// an empty spec encodes as the zero IPv4 address with port zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + 16 + 2);
        match (self.ip, &self.fqdn) {
            (Some(IpAddr::V4(ip)), _) => {
                buf.push(ATYP_IPV4);
                buf.extend_from_slice(&ip.octets());
            }
            (Some(IpAddr::V6(ip)), _) => {
                buf.push(ATYP_IPV6);
                buf.extend_from_slice(&ip.octets());
            }
            (None, Some(fqdn)) => {
                buf.push(ATYP_FQDN);
                buf.push(fqdn.len() as u8);
                buf.extend_from_slice(fqdn.as_bytes());
            }
            (None, None) => {
                buf.push(ATYP_IPV4);
                buf.extend_from_slice(&Ipv4Addr::UNSPECIFIED.octets());
            }
        }
        buf.extend_from_slice(&self.port.to_be_bytes());
        buf
    }
}

impl From<SocketAddr> for AddrSpec {
    fn from(addr: SocketAddr) -> Self {
        AddrSpec::from_ip(addr.ip(), addr.port())
    }
}

impl fmt::Display for AddrSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show the original name when we have one, the client asked for it.
        match (&self.fqdn, self.ip) {
            (Some(fqdn), _) => write!(f, "{}:{}", fqdn, self.port),
            (None, Some(ip)) => write!(f, "{}", SocketAddr::new(ip, self.port)),
            (None, None) => write!(f, "0.0.0.0:{}", self.port),
        }
    }
}
