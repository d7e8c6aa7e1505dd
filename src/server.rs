//! The SOCKS5 server: configuration, accept loop and session driver.
//!
//! A [`Server`] is immutable once built. [`Config`] collects the extension
//! points; [`Server::new`] fills in the defaults (no-auth or user/pass
//! depending on whether credentials were supplied, system DNS, allow-all
//! rules, plain TCP dial and listen) so the rest of the code never deals
//! with absent hooks.

use crate::context::Context;
use crate::error::ProxyError;
use crate::socks::auth::{negotiate, Authenticator, CredentialStore, NoAuth, UserPassAuthenticator};
use crate::socks::consts::SOCKS5_VERSION;
use crate::socks::handler::{
    handle_request, reply_or_log, Dialer, ListenerProvider, SystemDialer, SystemListener,
};
use crate::socks::reply::ReplyCode;
use crate::socks::request::Request;
use crate::socks::resolver::{DnsResolver, NameResolver};
use crate::socks::rewriter::AddressRewriter;
use crate::socks::rules::{permit_all, RuleSet};
use crate::socks::AddrSpec;
use anyhow::Context as _;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Buffered-reader capacity for the client socket. Handshake frames are
/// tiny; the relay moves payload in its own chunks.
const CLIENT_BUF_SIZE: usize = 4096;

/// Server construction options. Every field is optional; see [`Server::new`]
/// for the defaults.
#[derive(Default)]
pub struct Config {
    /// Authentication methods, in registration order. Empty means default
    /// from `credentials`.
    pub auth_methods: Vec<Arc<dyn Authenticator>>,
    /// Credential store backing the default user/pass authenticator.
    pub credentials: Option<Arc<dyn CredentialStore>>,
    /// Custom name resolution.
    pub resolver: Option<Arc<dyn NameResolver>>,
    /// Custom authorization.
    pub rules: Option<Arc<dyn RuleSet>>,
    /// Transparent destination rewriting. `None` keeps destinations as
    /// sent.
    pub rewriter: Option<Arc<dyn AddressRewriter>>,
    /// Address BIND listeners are created on. Defaults to the unspecified
    /// address.
    pub bind_ip: Option<IpAddr>,
    /// Custom outbound dialing.
    pub dial: Option<Arc<dyn Dialer>>,
    /// Custom BIND listener creation.
    pub listener: Option<Arc<dyn ListenerProvider>>,
    /// Upper bound on the outbound dial. Unlimited when `None`.
    pub connect_timeout: Option<Duration>,
}

impl Config {
    /// Enable user/pass authentication backed by `store` (unless explicit
    /// `auth_methods` are set, which take precedence).
    pub fn with_credentials(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(store);
        self
    }

    /// Add an authentication method.
    pub fn with_auth_method(mut self, method: Arc<dyn Authenticator>) -> Self {
        self.auth_methods.push(method);
        self
    }

    /// Override name resolution.
    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Override authorization.
    pub fn with_rules(mut self, rules: Arc<dyn RuleSet>) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Install a destination rewriter.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn AddressRewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Set the BIND listener address.
    pub fn with_bind_ip(mut self, ip: IpAddr) -> Self {
        self.bind_ip = Some(ip);
        self
    }

    /// Override outbound dialing.
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dial = Some(dialer);
        self
    }

    /// Override BIND listener creation.
    pub fn with_listener_provider(mut self, listener: Arc<dyn ListenerProvider>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Bound the outbound dial.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// A SOCKS5 proxy server. Cheap to share behind an [`Arc`]; all per-session
/// state lives in the session task.
pub struct Server {
    auth_methods: HashMap<u8, Arc<dyn Authenticator>>,
    pub(crate) resolver: Arc<dyn NameResolver>,
    pub(crate) rules: Arc<dyn RuleSet>,
    pub(crate) rewriter: Option<Arc<dyn AddressRewriter>>,
    pub(crate) dialer: Arc<dyn Dialer>,
    pub(crate) listener: Arc<dyn ListenerProvider>,
    pub(crate) bind_ip: Option<IpAddr>,
    pub(crate) connect_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Server {
    /// Build a server, applying defaults for every hook the config leaves
    /// unset. With neither `auth_methods` nor `credentials` the server is
    /// auth-less; credentials alone enable user/pass.
    pub fn new(config: Config) -> Self {
        let mut methods = config.auth_methods;
        if methods.is_empty() {
            match &config.credentials {
                Some(store) => methods.push(Arc::new(UserPassAuthenticator::new(store.clone()))),
                None => methods.push(Arc::new(NoAuth)),
            }
        }

        // Keyed by method code: at most one authenticator per method,
        // later registrations win.
        let mut auth_methods: HashMap<u8, Arc<dyn Authenticator>> = HashMap::new();
        for method in methods {
            auth_methods.insert(method.code(), method);
        }

        Server {
            auth_methods,
            resolver: config
                .resolver
                .unwrap_or_else(|| Arc::new(DnsResolver)),
            rules: config.rules.unwrap_or_else(|| Arc::new(permit_all())),
            rewriter: config.rewriter,
            dialer: config.dial.unwrap_or_else(|| Arc::new(SystemDialer)),
            listener: config
                .listener
                .unwrap_or_else(|| Arc::new(SystemListener)),
            bind_ip: config.bind_ip,
            connect_timeout: config.connect_timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Method codes currently registered, for introspection and tests.
    pub fn auth_method_codes(&self) -> Vec<u8> {
        self.auth_methods.keys().copied().collect()
    }

    /// Stop accepting connections and cancel in-flight pipeline stages.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Bind a TCP listener on `addr` and serve until shutdown.
    pub async fn listen_and_serve(self: Arc<Self>, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to listen on {addr}"))?;
        info!(%addr, "listener started");
        self.serve(listener).await
    }

    /// Accept connections from `listener`, spawning one session task per
    /// connection. Session failures are logged and never stop the loop.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("server shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (socket, peer) = accepted.context("accept failed")?;
                    let local = socket.local_addr().ok();
                    debug!(remote = %peer, "new connection");
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.session(socket, Some(peer), local).await {
                            error!(remote = %peer, local = ?local, err = %e, "session failed");
                        }
                    });
                }
            }
        }
    }

    /// Serve a single, already-accepted connection. Used directly by tests
    /// and by embedders with their own accept loop.
    pub async fn serve_conn<S>(&self, stream: S) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        self.session(stream, None, None).await
    }

    /// Drive one connection through the protocol phases: version byte,
    /// method negotiation, request parsing, then the policy pipeline and
    /// command handler. The socket is dropped on every exit path.
    async fn session<S>(
        &self,
        stream: S,
        peer: Option<SocketAddr>,
        local: Option<SocketAddr>,
    ) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin,
    {
        let mut stream = BufReader::with_capacity(CLIENT_BUF_SIZE, stream);

        // Pre-protocol: nothing has been committed to the wire yet, so a
        // foreign version byte just closes the socket.
        let version = stream.read_u8().await?;
        if version != SOCKS5_VERSION {
            warn!(remote = ?peer, version, "unsupported SOCKS version");
            return Err(ProxyError::UnsupportedVersion(version));
        }

        let auth = negotiate(&mut stream, &self.auth_methods).await?;

        let mut request = match Request::read_from(&mut stream).await {
            Ok(request) => request,
            Err(e) => {
                match e {
                    ProxyError::UnrecognizedAddrType(_) => {
                        reply_or_log(&mut stream, ReplyCode::AddrTypeNotSupported).await;
                    }
                    ProxyError::CommandNotSupported(_) => {
                        reply_or_log(&mut stream, ReplyCode::CommandNotSupported).await;
                    }
                    _ => {}
                }
                warn!(remote = ?peer, local = ?local, err = %e, "failed to read request");
                return Err(e);
            }
        };
        request.auth = auth;
        request.remote_addr = peer.map(AddrSpec::from);

        let ctx = Context::with_cancellation(self.cancel.child_token());
        handle_request(self, &mut stream, request, ctx).await
    }
}
