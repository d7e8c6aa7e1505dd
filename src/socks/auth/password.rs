//! Username/password sub-negotiation (RFC 1929).

use super::{AuthContext, Authenticator};
use crate::error::ProxyError;
use crate::socks::consts::*;
use crate::socks::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

/// Validates a username/password pair.
///
/// Called concurrently from every session negotiating user/pass, so
/// implementations must be thread-safe.
pub trait CredentialStore: Send + Sync {
    /// True when the pair is acceptable.
    fn valid(&self, username: &str, password: &str) -> bool;
}

/// An in-memory credential table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl CredentialStore for StaticCredentials {
    fn valid(&self, username: &str, password: &str) -> bool {
        self.users.get(username).map(String::as_str) == Some(password)
    }
}

impl From<HashMap<String, String>> for StaticCredentials {
    fn from(users: HashMap<String, String>) -> Self {
        StaticCredentials { users }
    }
}

impl FromIterator<(String, String)> for StaticCredentials {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        StaticCredentials {
            users: iter.into_iter().collect(),
        }
    }
}

/// Method 0x02: RFC 1929 username/password.
///
/// Reads the version-prefixed credential frame, consults the injected
/// [`CredentialStore`] and answers `[0x01, 0x00]` or `[0x01, 0x01]`.
pub struct UserPassAuthenticator {
    store: Arc<dyn CredentialStore>,
}

impl UserPassAuthenticator {
    /// An authenticator backed by the given store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        UserPassAuthenticator { store }
    }
}

#[async_trait::async_trait]
impl Authenticator for UserPassAuthenticator {
    fn code(&self) -> u8 {
        METHOD_USER_PASS
    }

    async fn authenticate(&self, stream: &mut dyn Stream) -> Result<AuthContext, ProxyError> {
        let version = stream.read_u8().await?;
        if version != USER_PASS_VERSION {
            return Err(ProxyError::Protocol(format!(
                "unsupported auth sub-negotiation version: {version}"
            )));
        }

        let ulen = stream.read_u8().await? as usize;
        let mut raw = vec![0u8; ulen];
        stream.read_exact(&mut raw).await?;
        let username = String::from_utf8(raw)
            .map_err(|_| ProxyError::Protocol("username is not valid UTF-8".into()))?;

        let plen = stream.read_u8().await? as usize;
        let mut raw = vec![0u8; plen];
        stream.read_exact(&mut raw).await?;
        let password = String::from_utf8(raw)
            .map_err(|_| ProxyError::Protocol("password is not valid UTF-8".into()))?;

        if self.store.valid(&username, &password) {
            stream
                .write_all(&[USER_PASS_VERSION, USER_PASS_SUCCESS])
                .await?;
            stream.flush().await?;
            debug!(user = %username, "user/pass authentication succeeded");
            Ok(AuthContext {
                method: METHOD_USER_PASS,
                payload: HashMap::from([("username".to_string(), username)]),
            })
        } else {
            stream
                .write_all(&[USER_PASS_VERSION, USER_PASS_FAILURE])
                .await?;
            stream.flush().await?;
            Err(ProxyError::AuthFailure(username))
        }
    }
}
