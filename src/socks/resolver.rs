//! Destination name resolution.

use crate::context::Context;
use std::io;
use std::net::IpAddr;

/// Resolves the FQDN of a request to an IP before dialing.
///
/// Invoked concurrently from every session whose destination is a domain
/// name. Returns the (possibly derived) context alongside the address.
#[async_trait::async_trait]
pub trait NameResolver: Send + Sync {
    /// Resolve `fqdn` to a single IP address.
    async fn resolve(&self, ctx: Context, fqdn: &str) -> io::Result<(Context, IpAddr)>;
}

/// The default resolver: system DNS via the runtime's host lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

#[async_trait::async_trait]
impl NameResolver for DnsResolver {
    async fn resolve(&self, ctx: Context, fqdn: &str) -> io::Result<(Context, IpAddr)> {
        let addr = tokio::select! {
            _ = ctx.cancelled() => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "resolution cancelled"));
            }
            looked_up = tokio::net::lookup_host((fqdn, 0)) => looked_up?
                .next()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::NotFound, format!("no addresses for {fqdn}"))
                })?,
        };
        Ok((ctx, addr.ip()))
    }
}
