use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::tuple::buffer::TupleBuffer;

/// One entry in the per-connection result queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// A computed value to append to the outbound stream.
    Value(u32),
    /// No more results for this stream: finalize and stop.
    Eos,
}

/// Drain the result queue into the downstream socket.
///
/// Sole owner of the socket and the output buffer, so every downstream write
/// is serialized here without locking. Terminates after the end-of-stream
/// marker is flushed, when the queue closes, or on cancellation. A write
/// failure cancels `token` so the frame loop stops as well.
pub(crate) async fn run_writer(
    mut rx: mpsc::Receiver<Output>,
    mut downstream: TcpStream,
    token: CancellationToken,
) -> Result<()> {
    let mut buffer = TupleBuffer::new();

    tokio::select! {
        _ = token.cancelled() => Ok(()),
        result = drain(&mut rx, &mut downstream, &mut buffer) => {
            if result.is_err() {
                // The downstream link is gone; stop the frame loop too.
                token.cancel();
            }
            result
        }
    }
}

async fn drain(
    rx: &mut mpsc::Receiver<Output>,
    downstream: &mut TcpStream,
    buffer: &mut TupleBuffer,
) -> Result<()> {
    while let Some(item) = rx.recv().await {
        match item {
            Output::Value(value) => {
                if let Some(chunk) = buffer.append(value) {
                    downstream.write_all(&chunk).await?;
                    downstream.flush().await?;
                }
            }
            Output::Eos => {
                let (flushed, terminal) = buffer.append_eos();
                if let Some(chunk) = flushed {
                    downstream.write_all(&chunk).await?;
                }
                downstream.write_all(&terminal).await?;
                downstream.flush().await?;
                tracing::debug!("end-of-stream marker flushed");
                return Ok(());
            }
        }
    }

    // Queue closed without a marker: the inbound side failed first.
    Ok(())
}
