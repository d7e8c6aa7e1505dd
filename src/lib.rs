//! # Burrow - an embeddable SOCKS5 proxy server
//!
//! Burrow implements the SOCKS5 protocol (RFC 1928) with username/password
//! authentication (RFC 1929), CONNECT and BIND commands, and a pluggable
//! policy pipeline. It ships as a library around [`Server`] plus a thin
//! binary driver.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use burrow::{Config, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = Arc::new(Server::new(Config::default()));
//!     server.listen_and_serve("0.0.0.0:1080").await
//! }
//! ```
//!
//! ## Extension points
//!
//! Every stage a deployment might want to own is a trait taken as an
//! `Arc<dyn ...>` in [`Config`]:
//!
//! - [`Authenticator`](socks::Authenticator) with the built-in
//!   [`NoAuth`](socks::NoAuth) and
//!   [`UserPassAuthenticator`](socks::UserPassAuthenticator)
//! - [`CredentialStore`](socks::CredentialStore) behind user/pass
//! - [`NameResolver`](socks::NameResolver), defaulting to system DNS
//! - [`RuleSet`](socks::RuleSet), defaulting to allow-all
//! - [`AddressRewriter`](socks::AddressRewriter) for transparent redirects
//! - [`Dialer`](socks::Dialer) and [`ListenerProvider`](socks::ListenerProvider)
//!   for the outbound and BIND sockets
//!
//! Sessions are independent tokio tasks; the server itself is immutable
//! after construction and safe to share.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod context;
pub mod error;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, parse_config, FileConfig};
pub use context::Context;
pub use error::ProxyError;
pub use server::{Config, Server};

/// Version of the burrow library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_populated() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn name_matches_package() {
        assert_eq!(NAME, "burrow");
    }
}
