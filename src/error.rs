//! Error types for burrow.
//!
//! [`ProxyError`] covers every failure a session can hit, from transport
//! errors up to policy denials. Most variants map to a wire reply code at
//! the point where they are raised.

use std::io;
use thiserror::Error;

/// Errors produced while serving a SOCKS5 session.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Socket read/write failure. Always aborts the session.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Client greeted or issued a request with a version other than 5.
    #[error("unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Address type byte outside {1, 3, 4}.
    #[error("unrecognized address type: {0}")]
    UnrecognizedAddrType(u8),

    /// Malformed frame contents (bad sub-negotiation version, empty
    /// domain, invalid UTF-8 in a name, ...).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Client offered no authentication method the server supports.
    #[error("no acceptable authentication method")]
    NoAcceptableMethod,

    /// Credentials rejected by the credential store.
    #[error("authentication failed for user {0:?}")]
    AuthFailure(String),

    /// The rule set denied the request.
    #[error("request for {dest} blocked by rules")]
    Blocked {
        /// Destination the client asked for.
        dest: String,
    },

    /// Name resolution failed.
    #[error("failed to resolve {fqdn:?}: {source}")]
    Resolve {
        /// The domain that could not be resolved.
        fqdn: String,
        /// Underlying resolver error.
        source: io::Error,
    },

    /// Outbound dial failed.
    #[error("connect to {dest} failed: {source}")]
    Connect {
        /// Dial target.
        dest: String,
        /// Underlying dial error.
        source: io::Error,
    },

    /// Command byte the server does not implement.
    #[error("command not supported: {0}")]
    CommandNotSupported(u8),

    /// Listener creation for BIND failed.
    #[error("bind listener on port {port} failed: {source}")]
    BindFailed {
        /// Requested listen port.
        port: u16,
        /// Underlying listen error.
        source: io::Error,
    },

    /// Local address of an established socket could not be determined.
    #[error("cannot derive bound address: {0}")]
    AddrConversion(String),
}
