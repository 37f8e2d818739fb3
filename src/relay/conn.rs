use std::io;
use std::str;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::compute::count_primes;
use crate::error::{Error, ProtocolError, Result};
use crate::frame::FrameReader;
use crate::retry::{self, RetryPolicy};
use crate::tuple;

use super::writer::{self, Output};
use super::RelayConfig;

/// Size of the address handshake that opens every inbound stream.
pub const HANDSHAKE_LEN: usize = 128;

/// Size of the opaque register message that follows the handshake.
pub const REGISTER_LEN: usize = 32;

/// Capacity of the per-connection result queue.
const RESULT_QUEUE_DEPTH: usize = 256;

/// Drive one inbound connection through its whole lifecycle: handshake,
/// downstream dial, register forwarding, then the frame loop. Any failure
/// tears down this connection and nothing else.
pub(crate) async fn handle_connection(
    mut inbound: TcpStream,
    config: Arc<RelayConfig>,
    token: CancellationToken,
) -> Result<()> {
    let addr = match timeout(config.handshake_timeout, read_handshake(&mut inbound)).await {
        Ok(read) => read?,
        Err(_) => return Err(ProtocolError::HandshakeTimeout.into()),
    };

    let mut downstream = dial_downstream(&addr, config.dial_retry.as_ref()).await?;

    // The register message goes downstream verbatim before any frame.
    let register = match timeout(config.handshake_timeout, read_register(&mut inbound)).await {
        Ok(read) => read?,
        Err(_) => return Err(ProtocolError::HandshakeTimeout.into()),
    };
    downstream.write_all(&register).await?;
    downstream.flush().await?;

    tracing::debug!(downstream = %addr, "stream established");

    let (tx, rx) = mpsc::channel(RESULT_QUEUE_DEPTH);
    let writer_task = tokio::spawn(writer::run_writer(rx, downstream, token.clone()));

    let result = stream_loop(inbound, &config, &tx, &token).await;

    // Dropping our sender lets the writer drain whatever is queued and exit.
    drop(tx);
    let writer_result = writer_task
        .await
        .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    result.and(writer_result)
}

/// Read frames until the inbound stream ends, pushing each frame's batch of
/// computations through the result queue. The end-of-stream marker is
/// enqueued exactly once, after the final frame's batch has drained.
async fn stream_loop(
    inbound: TcpStream,
    config: &RelayConfig,
    tx: &mpsc::Sender<Output>,
    token: &CancellationToken,
) -> Result<()> {
    let limiter = Arc::new(Semaphore::new(config.compute_concurrency));
    let mut reader = FrameReader::new(inbound, config.max_frame_len);

    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            frame = reader.next_frame() => frame?,
        };

        let Some(frame) = frame else {
            tracing::debug!("inbound stream ended");
            // The terminal marker still goes downstream after a clean end.
            if tx.send(Output::Eos).await.is_err() {
                tracing::debug!("writer gone before end-of-stream marker");
            }
            return Ok(());
        };

        process_frame(&frame.payload, &limiter, tx).await;
    }
}

/// Launch one computation per record and wait for the batch to drain.
///
/// Decoding never waits on a computation; each record's task is spawned as
/// soon as its value is read. Returning only after every task has finished
/// is what keeps the end-of-stream marker behind all of a frame's results,
/// and keeps at most one frame in flight per connection.
pub(crate) async fn process_frame(
    payload: &[u8],
    limiter: &Arc<Semaphore>,
    tx: &mpsc::Sender<Output>,
) {
    let mut batch = JoinSet::new();

    for value in tuple::record_values(payload) {
        let limiter = Arc::clone(limiter);
        let tx = tx.clone();
        batch.spawn(async move {
            // The semaphore only closes on shutdown; give up quietly then.
            let Ok(_permit) = limiter.acquire_owned().await else {
                return;
            };
            let result = count_primes(value);
            let _ = tx.send(Output::Value(result)).await;
        });
    }

    while batch.join_next().await.is_some() {}
}

async fn read_handshake(inbound: &mut TcpStream) -> Result<String> {
    let mut buf = [0u8; HANDSHAKE_LEN];
    inbound
        .read_exact(&mut buf)
        .await
        .map_err(|e| truncated(e, ProtocolError::TruncatedHandshake))?;

    let text = str::from_utf8(&buf).map_err(ProtocolError::AddressNotUtf8)?;
    let addr = text.trim_matches(char::from(0)).trim();
    if addr.is_empty() {
        return Err(ProtocolError::EmptyAddress.into());
    }
    Ok(addr.to_string())
}

async fn read_register(inbound: &mut TcpStream) -> Result<[u8; REGISTER_LEN]> {
    let mut buf = [0u8; REGISTER_LEN];
    inbound
        .read_exact(&mut buf)
        .await
        .map_err(|e| truncated(e, ProtocolError::TruncatedRegister))?;
    Ok(buf)
}

fn truncated(e: io::Error, short_read: ProtocolError) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        short_read.into()
    } else {
        Error::Io(e)
    }
}

async fn dial_downstream(addr: &str, policy: Option<&RetryPolicy>) -> Result<TcpStream> {
    let dialed = match policy {
        Some(policy) => retry::with_retry(policy, || TcpStream::connect(addr)).await,
        None => TcpStream::connect(addr).await,
    };

    let stream = dialed.map_err(|source| ProtocolError::DialFailed {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_nodelay(true).ok();
    Ok(stream)
}
