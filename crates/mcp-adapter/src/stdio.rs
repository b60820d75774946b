use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::server::McpServer;

const RESPONSE_QUEUE: usize = 256;

/// Serves newline-delimited JSON-RPC until EOF or cancellation.
///
/// Requests run concurrently so a long `wait` does not stall the stream; responses are written
/// one per line in completion order. Returns the number of messages read.
pub async fn serve_lines<R, W>(
    server: Arc<McpServer>,
    reader: R,
    writer: W,
    client_id: &str,
    cancel: CancellationToken,
) -> io::Result<u64>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<String>(RESPONSE_QUEUE);
    let writer_task = tokio::spawn(write_responses(writer, rx));
    let mut in_flight = JoinSet::new();
    let mut lines = reader.lines();
    let mut handled = 0u64;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("stdio transport cancelled");
                break;
            }
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                warn!(?err, "stdio read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        handled += 1;
        let server = Arc::clone(&server);
        let tx = tx.clone();
        let client = client_id.to_string();
        in_flight.spawn(async move {
            if let Some(resp) = server.handle_line(&line, &client).await {
                let _ = tx.send(resp.to_line()).await;
            }
        });
        while in_flight.try_join_next().is_some() {}
    }

    while in_flight.join_next().await.is_some() {}
    drop(tx);
    let written = match writer_task.await {
        Ok(result) => result?,
        Err(err) => return Err(io::Error::new(io::ErrorKind::Other, err)),
    };
    info!(handled, written, "stdio transport finished");
    Ok(handled)
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::Receiver<String>) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(line) = rx.recv().await {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        written += 1;
    }
    Ok(written)
}
