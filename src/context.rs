//! Request-scoped context threaded through the policy pipeline.
//!
//! Each pipeline stage (resolver, rewriter, rule set) receives a [`Context`]
//! and may hand back a derived one. Derivation never mutates the caller's
//! copy; values accumulate through cheap copy-on-write snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Immutable key/value bag plus a cancellation signal.
///
/// Cloning is cheap. Use [`Context::with_value`] to derive a context with an
/// additional entry; the original is left untouched.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: Arc<HashMap<String, String>>,
    cancel: CancellationToken,
}

impl Context {
    /// An empty context with its own cancellation token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context tied to an externally controlled cancellation token.
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        Context {
            values: Arc::default(),
            cancel,
        }
    }

    /// Derive a context carrying one more key/value entry.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(key.into(), value.into());
        Context {
            values: Arc::new(values),
            cancel: self.cancel.clone(),
        }
    }

    /// Look up a value set by an earlier pipeline stage.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// True once the session (or the whole server) is shutting down.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the context is cancelled. Hooks that block (resolver,
    /// dialer, listener) select against this.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The underlying cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_value_derives_without_mutating() {
        let base = Context::new();
        let derived = base.with_value("username", "alice");

        assert_eq!(base.value("username"), None);
        assert_eq!(derived.value("username"), Some("alice"));
    }

    #[test]
    fn derivation_chains_accumulate() {
        let ctx = Context::new()
            .with_value("a", "1")
            .with_value("b", "2")
            .with_value("a", "3");

        assert_eq!(ctx.value("a"), Some("3"));
        assert_eq!(ctx.value("b"), Some("2"));
    }

    #[test]
    fn cancellation_propagates_to_derived() {
        let token = CancellationToken::new();
        let ctx = Context::with_cancellation(token.clone());
        let derived = ctx.with_value("k", "v");

        assert!(!derived.is_cancelled());
        token.cancel();
        assert!(derived.is_cancelled());
    }
}
