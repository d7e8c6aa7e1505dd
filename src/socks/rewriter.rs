//! Transparent destination rewriting.

use crate::context::Context;
use crate::socks::addr::AddrSpec;
use crate::socks::request::Request;

/// Substitutes the destination of a request before authorization.
///
/// The returned address becomes `req.real_dest`, the address the CONNECT
/// and BIND handlers actually use; `req.dest` stays what the client sent.
#[async_trait::async_trait]
pub trait AddressRewriter: Send + Sync {
    /// Produce the effective destination for `req`.
    async fn rewrite(&self, ctx: Context, req: &Request) -> (Context, AddrSpec);
}

/// Keeps every destination unchanged. Configuring no rewriter is
/// equivalent; this type exists for explicit wiring and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityRewriter;

#[async_trait::async_trait]
impl AddressRewriter for IdentityRewriter {
    async fn rewrite(&self, ctx: Context, req: &Request) -> (Context, AddrSpec) {
        (ctx, req.dest.clone())
    }
}
