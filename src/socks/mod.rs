//! The SOCKS5 protocol engine.
//!
//! Wire-level pieces live in their own modules: the address codec
//! ([`addr`]), reply emission ([`reply`]), authentication ([`auth`]),
//! request parsing ([`request`]), the policy pipeline
//! ([`resolver`]/[`rewriter`]/[`rules`]), command handling ([`handler`])
//! and the relay pump ([`relay`]). The session driver in
//! [`crate::server`] stitches them together per connection.

pub mod addr;
pub mod auth;
pub mod consts;
pub mod handler;
pub mod relay;
pub mod reply;
pub mod request;
pub mod resolver;
pub mod rewriter;
pub mod rules;

pub use addr::AddrSpec;
pub use auth::{
    AuthContext, Authenticator, CredentialStore, NoAuth, StaticCredentials, UserPassAuthenticator,
};
pub use handler::{Dialer, ListenerProvider, SystemDialer, SystemListener};
pub use relay::pump;
pub use reply::{send_reply, ReplyCode};
pub use request::{Request, SocksCommand};
pub use resolver::{DnsResolver, NameResolver};
pub use rewriter::{AddressRewriter, IdentityRewriter};
pub use rules::{permit_all, permit_none, CommandRules, RuleSet};

use tokio::io::{AsyncRead, AsyncWrite};

/// The stream shape the protocol engine runs on.
///
/// Anything duplex, in-memory pairs included, can carry a session; the
/// accept loop feeds it TCP sockets.
pub trait Stream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Stream for T {}
