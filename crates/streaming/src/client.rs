//! TCP side of the gateway: one connection per call.

use crate::codec::{decode, encode, framed};
use async_trait::async_trait;
use corelib::error::{Error, Result};
use corelib::network::{PeerClient, Request, Response};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;

/// Sends each request over a fresh TCP connection.
///
/// Timeouts are left to the caller, which wraps every call.
#[derive(Debug, Clone, Default)]
pub struct TcpClient;

impl TcpClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PeerClient for TcpClient {
    async fn call(&self, addr: SocketAddr, request: Request) -> Result<Response> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| Error::unreachable(addr, e))?;
        stream.set_nodelay(true).ok();

        let mut frames = framed(stream);
        frames
            .send(encode(&request)?)
            .await
            .map_err(|e| Error::unreachable(addr, e))?;

        match frames.next().await {
            Some(Ok(frame)) => decode(&frame),
            Some(Err(e)) => Err(Error::unreachable(addr, e)),
            None => Err(Error::unreachable(addr, "connection closed before response")),
        }
    }
}
