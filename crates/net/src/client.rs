//! One-shot request/response calls.

use crate::codec::{read_frame, write_frame};
use crate::error::NetError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connects to `endpoint`, sends `request` and waits for one reply.
///
/// The whole exchange (connect included) must finish within `timeout`;
/// a slow peer is reported as [`NetError::Timeout`] and abandoned.
pub async fn call<Req, Resp>(
    endpoint: &str,
    request: &Req,
    timeout: Duration,
) -> Result<Resp, NetError>
where
    Req: Serialize,
    Resp: DeserializeOwned,
{
    let exchange = async {
        let mut stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        write_frame(&mut stream, request).await?;
        read_frame(&mut stream).await
    };
    tokio::time::timeout(timeout, exchange)
        .await
        .map_err(|_| NetError::Timeout(timeout))?
}
