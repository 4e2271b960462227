//! Newline-delimited JSON request server.
//!
//! Requests are read from `input` one line at a time and answered on
//! `output` in arrival order, which serializes operations per process.

pub mod codec;
pub mod dispatch;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Encoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::{AppError, Result};

use self::codec::{Inbound, RequestCodec, Response};

/// Serve requests until EOF, cancellation, or an I/O failure.
///
/// Malformed and oversized lines are answered with a `protocol` error and
/// a `null` id, then skipped.
///
/// # Errors
///
/// Returns `AppError::Io` if reading `input` or writing `output` fails.
pub async fn serve<R, W>(
    state: &AppState,
    input: R,
    mut output: W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut framed = FramedRead::new(input, RequestCodec::new());
    let mut encoder = RequestCodec::new();
    // FramedRead yields one `None` after a decode error before resuming.
    let mut recovering = false;

    loop {
        let item = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("server: cancellation received, stopping");
                break;
            }

            item = framed.next() => item,
        };

        let response = match item {
            None if recovering => {
                recovering = false;
                continue;
            }
            None => {
                info!("server: input closed");
                break;
            }
            Some(Err(err @ AppError::Protocol(_))) => {
                warn!(%err, "server: framing error, skipping line");
                recovering = true;
                Response::uncorrelated(err)
            }
            Some(Err(err)) => return Err(err),
            Some(Ok(Inbound::Malformed(reason))) => {
                recovering = false;
                warn!(%reason, "server: malformed request");
                Response::uncorrelated(AppError::Protocol(format!("malformed request: {reason}")))
            }
            Some(Ok(Inbound::Request(request))) => {
                recovering = false;
                dispatch::handle(state, request).await
            }
        };

        let mut buf = BytesMut::new();
        encoder.encode(response, &mut buf)?;
        output
            .write_all(&buf)
            .await
            .map_err(|err| AppError::Io(format!("failed to write response: {err}")))?;
        output
            .flush()
            .await
            .map_err(|err| AppError::Io(format!("failed to flush response: {err}")))?;
    }

    Ok(())
}
