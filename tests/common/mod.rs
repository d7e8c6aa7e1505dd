//! Shared helpers for the end-to-end tests.

#![allow(dead_code)]

use burrow::server::{Config, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Bind a server on an ephemeral loopback port and start serving.
pub async fn start_server(config: Config) -> (Arc<Server>, SocketAddr) {
    let server = Arc::new(Server::new(config));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });

    (server, addr)
}

/// Spawn a TCP echo server: every accepted connection has its bytes
/// written straight back until the peer stops sending.
pub async fn spawn_echo_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => return,
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// A port on loopback with nothing listening behind it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Greeting frame offering the given method codes.
pub fn greeting(methods: &[u8]) -> Vec<u8> {
    let mut frame = vec![0x05, methods.len() as u8];
    frame.extend_from_slice(methods);
    frame
}

/// CONNECT request frame for an IPv4 destination.
pub fn connect_request(ip: [u8; 4], port: u16) -> Vec<u8> {
    request(0x01, ip, port)
}

/// Request frame with an arbitrary command byte and IPv4 destination.
pub fn request(command: u8, ip: [u8; 4], port: u16) -> Vec<u8> {
    let mut frame = vec![0x05, command, 0x00, 0x01];
    frame.extend_from_slice(&ip);
    frame.extend_from_slice(&port.to_be_bytes());
    frame
}

/// Read the fixed-size portion of an IPv4 reply (10 bytes).
pub async fn read_reply(stream: &mut TcpStream) -> [u8; 10] {
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    reply
}

/// Run the no-auth greeting exchange, asserting the server accepts it.
pub async fn negotiate_no_auth(stream: &mut TcpStream) {
    stream.write_all(&greeting(&[0x00])).await.unwrap();
    let mut chosen = [0u8; 2];
    stream.read_exact(&mut chosen).await.unwrap();
    assert_eq!(chosen, [0x05, 0x00]);
}
