//! The bidirectional byte pump behind CONNECT and BIND.
//!
//! Once the success reply is on the wire the session is an opaque byte
//! stream in both directions. Each direction is copied independently; when
//! one side reaches EOF its counterpart's write half is shut down (a TCP
//! half-close), letting the reverse direction drain naturally. The pump
//! returns only after both directions have finished.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Copy bytes between `client` and `target` until both directions close.
///
/// Returns the bytes moved client-to-target and target-to-client. When a
/// direction fails with a transport error the other direction is still
/// driven to completion and the first error is returned.
pub async fn pump<C, T>(client: C, target: T) -> io::Result<(u64, u64)>
where
    C: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut target_rd, mut target_wr) = tokio::io::split(target);

    let upstream = async {
        let copied = tokio::io::copy(&mut client_rd, &mut target_wr).await;
        // Signal end-of-stream to the target without tearing down the
        // reverse direction.
        let _ = target_wr.shutdown().await;
        copied
    };
    let downstream = async {
        let copied = tokio::io::copy(&mut target_rd, &mut client_wr).await;
        let _ = client_wr.shutdown().await;
        copied
    };

    let (up, down) = tokio::join!(upstream, downstream);
    trace!(up = ?up, down = ?down, "pump finished");
    match (up, down) {
        (Ok(up), Ok(down)) => Ok((up, down)),
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}
