//! Line-delimited JSON framing over the control socket (spec §4.G, §6).
//!
//! One JSON object per request terminated by `\n`; the server writes
//! exactly one response line then half-closes its write side.

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::error::IpcError;

/// Read one line from `reader`. Returns `Ok(None)` on clean EOF before any
/// bytes were read (the caller should treat this as "no request").
pub async fn read_line<R: tokio::io::AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<Option<String>, IpcError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Write exactly one response line, terminated by `\n`, then flush.
pub async fn write_response<W: AsyncWrite + Unpin>(writer: &mut W, response: &Value) -> Result<(), IpcError> {
    let mut line = serde_json::to_string(response).map_err(|e| IpcError::Io(e.to_string()))?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
