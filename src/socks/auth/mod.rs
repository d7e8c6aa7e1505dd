//! Authentication method negotiation.
//!
//! The greeting names the methods the client is willing to use; the server
//! picks the first of those it has an [`Authenticator`] registered for and
//! hands the socket to it for method-specific sub-negotiation.

mod none;
mod password;

pub use none::NoAuth;
pub use password::{CredentialStore, StaticCredentials, UserPassAuthenticator};

use crate::error::ProxyError;
use crate::socks::consts::*;
use crate::socks::Stream;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Outcome of a successful sub-negotiation, attached to the request and
/// visible to the policy pipeline.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// Method code that authenticated this session.
    pub method: u8,
    /// Method-specific payload, e.g. `"username"` for user/pass.
    pub payload: HashMap<String, String>,
}

impl AuthContext {
    /// The authenticated username, when the method produced one.
    pub fn username(&self) -> Option<&str> {
        self.payload.get("username").map(String::as_str)
    }
}

/// A pluggable authentication method.
///
/// Implementations are shared across sessions and invoked concurrently on
/// distinct sockets, so they must be reentrant.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    /// Method code advertised during negotiation.
    fn code(&self) -> u8;

    /// Run the method-specific sub-negotiation on the client socket.
    async fn authenticate(&self, stream: &mut dyn Stream) -> Result<AuthContext, ProxyError>;
}

/// Run method selection and the chosen sub-negotiation.
///
/// Reads `nmethods` and the client's method list, picks the first client
/// offer present in `registry`, confirms it on the wire and delegates.
/// When nothing matches, `[0x05, 0xFF]` is sent and the session fails.
pub(crate) async fn negotiate<S>(
    stream: &mut S,
    registry: &HashMap<u8, Arc<dyn Authenticator>>,
) -> Result<AuthContext, ProxyError>
where
    S: Stream,
{
    let nmethods = stream.read_u8().await? as usize;
    let mut methods = vec![0u8; nmethods];
    stream.read_exact(&mut methods).await?;

    // Client order decides precedence among mutually supported methods.
    for code in &methods {
        if let Some(auth) = registry.get(code) {
            stream.write_all(&[SOCKS5_VERSION, *code]).await?;
            stream.flush().await?;
            return auth.authenticate(stream).await;
        }
    }

    stream
        .write_all(&[SOCKS5_VERSION, METHOD_NO_ACCEPTABLE])
        .await?;
    stream.flush().await?;
    Err(ProxyError::NoAcceptableMethod)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn registry(auths: Vec<Arc<dyn Authenticator>>) -> HashMap<u8, Arc<dyn Authenticator>> {
        auths.into_iter().map(|a| (a.code(), a)).collect()
    }

    #[tokio::test]
    async fn selects_no_auth_when_offered() {
        let (mut client, mut server) = duplex(256);
        client.write_all(&[0x01, METHOD_NO_AUTH]).await.unwrap();

        let reg = registry(vec![Arc::new(NoAuth)]);
        let auth = negotiate(&mut server, &reg).await.unwrap();
        assert_eq!(auth.method, METHOD_NO_AUTH);
        assert!(auth.payload.is_empty());

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn client_order_wins() {
        let (mut client, mut server) = duplex(256);
        // Client prefers user/pass even though the server also knows no-auth.
        client
            .write_all(&[0x02, METHOD_USER_PASS, METHOD_NO_AUTH])
            .await
            .unwrap();
        // Minimal RFC 1929 exchange for user "u" / pass "p".
        client
            .write_all(&[0x01, 0x01, b'u', 0x01, b'p'])
            .await
            .unwrap();

        let store = StaticCredentials::from_iter([("u".to_string(), "p".to_string())]);
        let reg = registry(vec![
            Arc::new(NoAuth),
            Arc::new(UserPassAuthenticator::new(Arc::new(store))),
        ]);
        let auth = negotiate(&mut server, &reg).await.unwrap();
        assert_eq!(auth.method, METHOD_USER_PASS);
        assert_eq!(auth.username(), Some("u"));

        let mut selected = [0u8; 2];
        client.read_exact(&mut selected).await.unwrap();
        assert_eq!(selected, [0x05, 0x02]);
    }

    #[tokio::test]
    async fn no_common_method_replies_ff() {
        let (mut client, mut server) = duplex(256);
        client.write_all(&[0x01, METHOD_USER_PASS]).await.unwrap();

        let reg = registry(vec![Arc::new(NoAuth)]);
        let err = negotiate(&mut server, &reg).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoAcceptableMethod));

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }

    #[tokio::test]
    async fn zero_methods_replies_ff() {
        let (mut client, mut server) = duplex(256);
        client.write_all(&[0x00]).await.unwrap();

        let reg = registry(vec![Arc::new(NoAuth)]);
        let err = negotiate(&mut server, &reg).await.unwrap_err();
        assert!(matches!(err, ProxyError::NoAcceptableMethod));

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }
}
