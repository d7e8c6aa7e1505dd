//! Client request parsing.
//!
//! After authentication the client sends one request frame:
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use crate::error::ProxyError;
use crate::socks::addr::AddrSpec;
use crate::socks::auth::AuthContext;
use crate::socks::consts::SOCKS5_VERSION;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};

/// The commands of RFC 1928 section 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// Establish an outbound TCP connection.
    Connect,
    /// Listen for one inbound TCP connection on behalf of the client.
    Bind,
    /// Set up a UDP relay (not supported by this server).
    Associate,
}

impl SocksCommand {
    /// Parse a command byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SocksCommand::Connect),
            0x02 => Some(SocksCommand::Bind),
            0x03 => Some(SocksCommand::Associate),
            _ => None,
        }
    }

    /// The wire byte for this command.
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => 0x01,
            SocksCommand::Bind => 0x02,
            SocksCommand::Associate => 0x03,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::Associate => write!(f, "ASSOCIATE"),
        }
    }
}

/// A parsed client request, enriched by the session driver and the policy
/// pipeline before dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    /// Protocol version, always 5.
    pub version: u8,
    /// Requested command.
    pub command: SocksCommand,
    /// Destination as the client sent it. Resolution fills in `dest.ip`
    /// while keeping `dest.fqdn`.
    pub dest: AddrSpec,
    /// Effective destination after rewriting. `Some` once the pipeline has
    /// run; equal to `dest` unless a rewriter substituted it.
    pub real_dest: Option<AddrSpec>,
    /// Address of the client peer, when known.
    pub remote_addr: Option<AddrSpec>,
    /// Outcome of authentication.
    pub auth: AuthContext,
}

impl Request {
    /// Read and validate one request frame.
    ///
    /// The version byte must be 5 and the command one of CONNECT, BIND,
    /// ASSOCIATE; anything else is rejected here so the driver can answer
    /// with the matching reply code before closing.
    pub async fn read_from<R>(r: &mut R) -> Result<Self, ProxyError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut header = [0u8; 3];
        r.read_exact(&mut header).await?;

        if header[0] != SOCKS5_VERSION {
            return Err(ProxyError::UnsupportedVersion(header[0]));
        }
        let command =
            SocksCommand::from_byte(header[1]).ok_or(ProxyError::CommandNotSupported(header[1]))?;
        // header[2] is the reserved byte; ignored.

        let dest = AddrSpec::read_from(r).await?;

        Ok(Request {
            version: SOCKS5_VERSION,
            command,
            dest,
            real_dest: None,
            remote_addr: None,
            auth: AuthContext::default(),
        })
    }
}
