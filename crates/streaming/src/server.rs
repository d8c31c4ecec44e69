//! TCP side of the gateway: accepts connections and feeds each frame to the
//! local request handler.

use crate::codec::{decode, encode, framed};
use corelib::error::{Error, Result};
use corelib::network::{Request, RequestHandler, Response};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct TcpServer {
    listener: TcpListener,
}

impl TcpServer {
    /// Binds the listening socket. Bind before creating the node so the
    /// node id can be derived from the actual address (port 0 included).
    ///
    /// A failed bind is a local setup fault and reported as
    /// [`Error::InvalidConfig`], never as a retryable peer error.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::InvalidConfig(format!("cannot bind {}: {}", addr, e)))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::InvalidConfig(format!("listener has no address: {}", e)))
    }

    /// Accepts connections until `shutdown` fires.
    pub async fn serve(self, handler: Arc<dyn RequestHandler>, shutdown: CancellationToken) {
        let local = self.local_addr().ok();
        info!("Gateway listening on {:?}", local);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler).await {
                                debug!("Connection from {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        }

        info!("Gateway on {:?} stopped", local);
    }
}

async fn serve_connection(stream: TcpStream, handler: Arc<dyn RequestHandler>) -> Result<()> {
    stream.set_nodelay(true).ok();
    let mut frames = framed(stream);

    while let Some(frame) = frames.next().await {
        let frame = frame.map_err(|e| Error::Codec(e.to_string()))?;
        let response = match decode::<Request>(&frame) {
            Ok(request) => handler.handle(request).await,
            Err(e) => Response::Error(e),
        };
        frames
            .send(encode(&response)?)
            .await
            .map_err(|e| Error::Codec(e.to_string()))?;
    }

    Ok(())
}
