//! Generic request/response server.
//!
//! Accepts TCP connections until the shutdown token fires and answers every
//! frame on a connection with one reply frame from the [`Handler`].

use crate::codec::{read_frame, write_frame};
use crate::error::NetError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Answers decoded requests. Errors are part of `Resp`; a handler never
/// fails the connection.
#[async_trait]
pub trait Handler<Req, Resp>: Send + Sync + 'static {
    async fn handle(&self, request: Req) -> Resp;
}

/// Runs the accept loop on `listener` until `shutdown` is cancelled.
pub async fn serve<Req, Resp>(
    listener: TcpListener,
    handler: Arc<dyn Handler<Req, Resp>>,
    shutdown: CancellationToken,
) where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    let local = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "?".to_string());
    debug!(%local, "accepting connections");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(%local, "stopped accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let handler = Arc::clone(&handler);
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, handler, shutdown).await {
                            debug!(%peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => warn!(%local, error = %e, "accept failed"),
            }
        }
    }
}

async fn handle_connection<Req, Resp>(
    mut stream: TcpStream,
    handler: Arc<dyn Handler<Req, Resp>>,
    shutdown: CancellationToken,
) -> Result<(), NetError>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    stream.set_nodelay(true)?;
    loop {
        let request: Req = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = read_frame(&mut stream) => match read {
                Ok(request) => request,
                Err(NetError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
                Err(e) => return Err(e),
            },
        };
        let response = handler.handle(request).await;
        write_frame(&mut stream, &response).await?;
    }
}
