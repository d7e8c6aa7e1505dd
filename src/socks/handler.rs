//! Request dispatch: the policy pipeline and the command handlers.
//!
//! Every parsed request flows through resolve, rewrite and authorize in
//! that order, each stage threading the session [`Context`] forward, then
//! dispatches on the command. CONNECT owns the outbound socket for the
//! lifetime of the relay; BIND owns its listener and the accepted peer.

use crate::context::Context;
use crate::error::ProxyError;
use crate::server::Server;
use crate::socks::addr::AddrSpec;
use crate::socks::relay::pump;
use crate::socks::reply::{send_reply, ReplyCode};
use crate::socks::request::{Request, SocksCommand};
use crate::socks::Stream;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

/// Opens the outbound connection for CONNECT.
///
/// Invoked concurrently from every session; must be thread-safe and honor
/// cancellation of the passed context.
#[async_trait::async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to `addr` (`host:port`) over `network` (always `"tcp"`).
    async fn dial(&self, ctx: &Context, network: &str, addr: &str) -> io::Result<TcpStream>;
}

/// The default dialer: a plain TCP connect.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDialer;

#[async_trait::async_trait]
impl Dialer for SystemDialer {
    async fn dial(&self, ctx: &Context, _network: &str, addr: &str) -> io::Result<TcpStream> {
        tokio::select! {
            _ = ctx.cancelled() => Err(io::Error::new(io::ErrorKind::Interrupted, "dial cancelled")),
            conn = TcpStream::connect(addr) => conn,
        }
    }
}

/// Creates the listener backing a BIND command.
#[async_trait::async_trait]
pub trait ListenerProvider: Send + Sync {
    /// Listen on `addr` over `network` (always `"tcp"`).
    async fn listen(&self, ctx: &Context, network: &str, addr: SocketAddr)
        -> io::Result<TcpListener>;
}

/// The default listener provider: a plain TCP bind.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemListener;

#[async_trait::async_trait]
impl ListenerProvider for SystemListener {
    async fn listen(
        &self,
        ctx: &Context,
        _network: &str,
        addr: SocketAddr,
    ) -> io::Result<TcpListener> {
        tokio::select! {
            _ = ctx.cancelled() => Err(io::Error::new(io::ErrorKind::Interrupted, "listen cancelled")),
            listener = TcpListener::bind(addr) => listener,
        }
    }
}

/// Send an error reply without letting a write failure mask the error that
/// caused it.
pub(crate) async fn reply_or_log<S>(stream: &mut S, code: ReplyCode)
where
    S: Stream,
{
    if let Err(e) = send_reply(stream, code, None).await {
        warn!(code = ?code, err = %e, "failed to send error reply");
    }
}

/// Map a dial failure to the reply code the client sees.
///
/// Structured error kinds are checked first; the message substrings keep
/// parity with dialers that only surface stringly errors.
fn dial_error_reply(err: &io::Error) -> ReplyCode {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ReplyCode::ConnectionRefused,
        io::ErrorKind::NetworkUnreachable => ReplyCode::NetworkUnreachable,
        io::ErrorKind::HostUnreachable => ReplyCode::HostUnreachable,
        _ => {
            let msg = err.to_string();
            if msg.contains("refused") {
                ReplyCode::ConnectionRefused
            } else if msg.contains("network is unreachable") {
                ReplyCode::NetworkUnreachable
            } else {
                ReplyCode::HostUnreachable
            }
        }
    }
}

/// Run the policy pipeline on `req`, then dispatch its command.
pub(crate) async fn handle_request<S>(
    server: &Server,
    stream: &mut S,
    mut req: Request,
    mut ctx: Context,
) -> Result<(), ProxyError>
where
    S: Stream,
{
    // Resolve the destination when the client sent a name. The name is
    // kept alongside the resolved address for the rewriter and rules.
    if let Some(fqdn) = req.dest.fqdn.clone() {
        match server.resolver.resolve(ctx, &fqdn).await {
            Ok((derived, ip)) => {
                ctx = derived;
                req.dest.ip = Some(ip);
            }
            Err(e) => {
                reply_or_log(stream, ReplyCode::HostUnreachable).await;
                return Err(ProxyError::Resolve { fqdn, source: e });
            }
        }
    }

    // Rewrite. Absence of a rewriter is the identity.
    let real_dest = match &server.rewriter {
        Some(rewriter) => {
            let (derived, addr) = rewriter.rewrite(ctx, &req).await;
            ctx = derived;
            addr
        }
        None => req.dest.clone(),
    };
    req.real_dest = Some(real_dest);

    // Authorize.
    let (derived, allowed) = server.rules.allow(ctx, &req).await;
    ctx = derived;
    if !allowed {
        reply_or_log(stream, ReplyCode::RuleFailure).await;
        return Err(ProxyError::Blocked {
            dest: req.dest.to_string(),
        });
    }

    match req.command {
        SocksCommand::Connect => handle_connect(server, stream, &req, &ctx).await,
        SocksCommand::Bind => handle_bind(server, stream, &req, &ctx).await,
        SocksCommand::Associate => {
            send_reply(stream, ReplyCode::CommandNotSupported, None).await?;
            Ok(())
        }
    }
}

/// CONNECT: dial the effective destination and relay until both sides
/// close.
async fn handle_connect<S>(
    server: &Server,
    stream: &mut S,
    req: &Request,
    ctx: &Context,
) -> Result<(), ProxyError>
where
    S: Stream,
{
    let dest = req.real_dest.as_ref().unwrap_or(&req.dest);
    let addr = dest.address();

    let dialed = match server.connect_timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, server.dialer.dial(ctx, "tcp", &addr)).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            }
        }
        None => server.dialer.dial(ctx, "tcp", &addr).await,
    };
    let target = match dialed {
        Ok(target) => target,
        Err(e) => {
            reply_or_log(stream, dial_error_reply(&e)).await;
            return Err(ProxyError::Connect {
                dest: addr,
                source: e,
            });
        }
    };

    let bound = match target.local_addr() {
        Ok(local) => AddrSpec::from(local),
        Err(e) => {
            reply_or_log(stream, ReplyCode::GeneralFailure).await;
            return Err(ProxyError::AddrConversion(e.to_string()));
        }
    };
    send_reply(stream, ReplyCode::Success, Some(&bound)).await?;
    debug!(dest = %dest, bound = %bound, "connect tunnel established");

    let (up, down) = pump(&mut *stream, target).await?;
    debug!(dest = %dest, up, down, "connect tunnel closed");
    Ok(())
}

/// BIND: listen on the requested port, tell the client where, accept one
/// peer, tell the client who, then relay.
async fn handle_bind<S>(
    server: &Server,
    stream: &mut S,
    req: &Request,
    ctx: &Context,
) -> Result<(), ProxyError>
where
    S: Stream,
{
    let port = req.real_dest.as_ref().unwrap_or(&req.dest).port;
    let bind_addr = SocketAddr::new(
        server.bind_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        port,
    );

    let listener = match server.listener.listen(ctx, "tcp", bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            reply_or_log(stream, ReplyCode::GeneralFailure).await;
            return Err(ProxyError::BindFailed { port, source: e });
        }
    };
    let bound = match listener.local_addr() {
        Ok(local) => AddrSpec::from(local),
        Err(e) => {
            reply_or_log(stream, ReplyCode::GeneralFailure).await;
            return Err(ProxyError::AddrConversion(e.to_string()));
        }
    };

    // First reply carries the listener address the remote peer should
    // connect to.
    send_reply(stream, ReplyCode::Success, Some(&bound)).await?;
    debug!(bound = %bound, "bind listener ready");

    let (inbound, peer) = tokio::select! {
        _ = ctx.cancelled() => {
            reply_or_log(stream, ReplyCode::GeneralFailure).await;
            return Err(io::Error::new(io::ErrorKind::Interrupted, "bind cancelled").into());
        }
        accepted = listener.accept() => match accepted {
            Ok(pair) => pair,
            Err(e) => {
                reply_or_log(stream, ReplyCode::GeneralFailure).await;
                return Err(ProxyError::Io(e));
            }
        },
    };

    // Second reply names the peer that connected.
    send_reply(stream, ReplyCode::Success, Some(&AddrSpec::from(peer))).await?;
    debug!(peer = %peer, "bind peer accepted");

    let (up, down) = pump(&mut *stream, inbound).await?;
    debug!(peer = %peer, up, down, "bind tunnel closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Config;
    use crate::socks::auth::AuthContext;
    use crate::socks::rules::{permit_none, RuleSet};
    use std::sync::{Arc, Mutex};
    use tokio::io::{duplex, AsyncReadExt};

    fn connect_request(dest: AddrSpec) -> Request {
        Request {
            version: 5,
            command: SocksCommand::Connect,
            dest,
            real_dest: None,
            remote_addr: None,
            auth: AuthContext::default(),
        }
    }

    #[test]
    fn dial_errors_map_to_reply_codes() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "x");
        assert_eq!(dial_error_reply(&refused), ReplyCode::ConnectionRefused);

        let refused_msg = io::Error::other("connection refused by peer");
        assert_eq!(dial_error_reply(&refused_msg), ReplyCode::ConnectionRefused);

        let net_msg = io::Error::other("network is unreachable");
        assert_eq!(dial_error_reply(&net_msg), ReplyCode::NetworkUnreachable);

        let timeout = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        assert_eq!(dial_error_reply(&timeout), ReplyCode::HostUnreachable);

        let other = io::Error::other("no route");
        assert_eq!(dial_error_reply(&other), ReplyCode::HostUnreachable);
    }

    /// Records the effective destination seen at authorization time.
    struct CapturingDeny {
        seen: Arc<Mutex<Option<AddrSpec>>>,
    }

    #[async_trait::async_trait]
    impl RuleSet for CapturingDeny {
        async fn allow(&self, ctx: Context, req: &Request) -> (Context, bool) {
            *self.seen.lock().unwrap() = req.real_dest.clone();
            (ctx, false)
        }
    }

    #[tokio::test]
    async fn identity_pipeline_dispatches_with_unchanged_dest() {
        let seen = Arc::new(Mutex::new(None));
        let server = Server::new(Config::default().with_rules(Arc::new(CapturingDeny {
            seen: seen.clone(),
        })));

        let dest = AddrSpec::from_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 22);
        let (mut client, mut proxy_side) = duplex(256);

        let err = handle_request(
            &server,
            &mut proxy_side,
            connect_request(dest.clone()),
            Context::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::Blocked { .. }));

        // No resolver or rewriter ran, so authorization saw the request
        // destination verbatim.
        assert_eq!(seen.lock().unwrap().as_ref(), Some(&dest));

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply[..4], &[0x05, 0x02, 0x00, 0x01]);
    }

    #[tokio::test]
    async fn denial_replies_rule_failure() {
        let server = Server::new(Config::default().with_rules(Arc::new(permit_none())));
        let dest = AddrSpec::from_ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 22);
        let (mut client, mut proxy_side) = duplex(256);

        let result = handle_request(
            &server,
            &mut proxy_side,
            connect_request(dest),
            Context::new(),
        )
        .await;
        assert!(result.is_err());

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x02, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn associate_replies_command_not_supported() {
        let server = Server::new(Config::default());
        let dest = AddrSpec::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let mut req = connect_request(dest);
        req.command = SocksCommand::Associate;
        let (mut client, mut proxy_side) = duplex(256);

        handle_request(&server, &mut proxy_side, req, Context::new())
            .await
            .unwrap();

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], u8::from(ReplyCode::CommandNotSupported));
    }

    #[tokio::test]
    async fn refused_dial_replies_connection_refused() {
        let server = Server::new(Config::default());

        // Bind then drop to find a port with nothing listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let dest = AddrSpec::from_ip(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let (mut client, mut proxy_side) = duplex(256);

        let err = handle_request(
            &server,
            &mut proxy_side,
            connect_request(dest),
            Context::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProxyError::Connect { .. }));

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], u8::from(ReplyCode::ConnectionRefused));
    }
}
