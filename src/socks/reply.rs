//! SOCKS5 reply emission.
//!
//! Every accepted connection that makes it past the greeting receives one
//! final reply frame built here (BIND sends a second one after accept, per
//! RFC 1928).

use crate::socks::addr::AddrSpec;
use crate::socks::consts::*;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Server reply codes, RFC 1928 section 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Request granted.
    Success = 0x00,
    /// General SOCKS server failure.
    GeneralFailure = 0x01,
    /// Connection not allowed by the rule set.
    RuleFailure = 0x02,
    /// Network unreachable.
    NetworkUnreachable = 0x03,
    /// Host unreachable.
    HostUnreachable = 0x04,
    /// Connection refused by the destination.
    ConnectionRefused = 0x05,
    /// TTL expired.
    TtlExpired = 0x06,
    /// Command not supported.
    CommandNotSupported = 0x07,
    /// Address type not supported.
    AddrTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> u8 {
        code as u8
    }
}

/// Serialize and send a reply frame in a single write.
///
/// `bind` is the server-chosen bound address; `None` emits the zero IPv4
/// address, which is what every error reply carries.
pub async fn send_reply<W>(w: &mut W, code: ReplyCode, bind: Option<&AddrSpec>) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let addr_bytes = match bind {
        Some(spec) => spec.to_bytes(),
        None => AddrSpec::default().to_bytes(),
    };
    let mut frame = Vec::with_capacity(3 + addr_bytes.len());
    frame.push(SOCKS5_VERSION);
    frame.push(code.into());
    frame.push(RESERVED);
    frame.extend_from_slice(&addr_bytes);

    w.write_all(&frame).await?;
    w.flush().await
}
