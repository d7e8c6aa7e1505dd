//! Request authorization.

use crate::context::Context;
use crate::socks::request::{Request, SocksCommand};

/// Decides whether a request may proceed to its command handler.
///
/// Runs after resolution and rewriting, so `req.real_dest` reflects the
/// address that would actually be dialed. Shared across sessions; must be
/// thread-safe.
#[async_trait::async_trait]
pub trait RuleSet: Send + Sync {
    /// Authorize `req`, optionally deriving the context.
    async fn allow(&self, ctx: Context, req: &Request) -> (Context, bool);
}

/// Per-command allow flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRules {
    /// Permit CONNECT.
    pub connect: bool,
    /// Permit BIND.
    pub bind: bool,
    /// Permit ASSOCIATE.
    pub associate: bool,
}

/// Rules that permit every command. The server default.
pub fn permit_all() -> CommandRules {
    CommandRules {
        connect: true,
        bind: true,
        associate: true,
    }
}

/// Rules that deny every command.
pub fn permit_none() -> CommandRules {
    CommandRules {
        connect: false,
        bind: false,
        associate: false,
    }
}

#[async_trait::async_trait]
impl RuleSet for CommandRules {
    async fn allow(&self, ctx: Context, req: &Request) -> (Context, bool) {
        let allowed = match req.command {
            SocksCommand::Connect => self.connect,
            SocksCommand::Bind => self.bind,
            SocksCommand::Associate => self.associate,
        };
        (ctx, allowed)
    }
}
