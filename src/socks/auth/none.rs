//! The "no authentication required" method.

use super::{AuthContext, Authenticator};
use crate::error::ProxyError;
use crate::socks::consts::METHOD_NO_AUTH;
use crate::socks::Stream;

/// Method 0x00. Accepts every session without touching the socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait::async_trait]
impl Authenticator for NoAuth {
    fn code(&self) -> u8 {
        METHOD_NO_AUTH
    }

    async fn authenticate(&self, _stream: &mut dyn Stream) -> Result<AuthContext, ProxyError> {
        Ok(AuthContext {
            method: METHOD_NO_AUTH,
            payload: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn accepts_without_io() {
        let mut stream = Cursor::new(Vec::new());
        let auth = NoAuth.authenticate(&mut stream).await.unwrap();
        assert_eq!(auth.method, METHOD_NO_AUTH);
        assert!(auth.payload.is_empty());
        assert!(stream.get_ref().is_empty());
    }
}
