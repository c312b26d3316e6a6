// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Length-prefixed JSON framing (spec.md §4.4.2, §6.3 normative):
//! `frame := uint64_le(len) || utf8_json_bytes`. Both directions of the
//! host/plugin conversation use the same framing.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// A frame length below this is a protocol error (spec.md §4.4.2).
const MIN_FRAME_LEN: u64 = 2;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid payload size: frame length {0} is below the minimum of {MIN_FRAME_LEN}")]
    InvalidPayloadSize(u64),
    #[error("truncated payload: expected {expected} bytes, stream ended early")]
    TruncatedPayload { expected: u64 },
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `message` and write it as one frame.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(message)?;
    writer.write_u64_le(payload.len() as u64).await?;
    writer.write_all(&payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame and decode it as `T`. Returns `Ok(None)` on a clean EOF
/// before any bytes of a new frame's length header have arrived (the normal
/// "child closed its output" case); any other truncation is a hard error.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, Error>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = match reader.read_u64_le().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len < MIN_FRAME_LEN {
        return Err(Error::InvalidPayloadSize(len));
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedPayload { expected: len },
            _ => Error::Io(e),
        })?;

    Ok(Some(serde_json::from_slice(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use ws_types::plugin::{DiagnosticSeverity, PluginToHostMessage};

    #[tokio::test]
    async fn loopback_round_trips_a_message() {
        let mut buffer = Vec::new();
        let message = PluginToHostMessage::EmitDiagnostic {
            severity: DiagnosticSeverity::Warning,
            message: "heads up".into(),
            file: None,
            line: None,
        };
        write_message(&mut buffer, &message).await.unwrap();

        let mut cursor = Cursor::new(buffer);
        let decoded: PluginToHostMessage = read_message(&mut cursor).await.unwrap().unwrap();
        assert_eq!(decoded, message);
    }

    #[tokio::test]
    async fn header_of_length_one_is_invalid_payload_size() {
        let mut buffer = 1u64.to_le_bytes().to_vec();
        buffer.push(b'{');
        let mut cursor = Cursor::new(buffer);
        let result: Result<Option<serde_json::Value>, Error> = read_message(&mut cursor).await;
        assert!(matches!(result, Err(Error::InvalidPayloadSize(1))));
    }

    #[tokio::test]
    async fn truncated_body_is_a_truncated_payload_error() {
        let mut buffer = 10u64.to_le_bytes().to_vec();
        buffer.extend_from_slice(b"{\"a\":1}"); // shorter than the declared 10 bytes
        let mut cursor = Cursor::new(buffer);
        let result: Result<Option<serde_json::Value>, Error> = read_message(&mut cursor).await;
        assert!(matches!(result, Err(Error::TruncatedPayload { expected: 10 })));
    }

    #[tokio::test]
    async fn clean_eof_before_any_header_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let result: Option<serde_json::Value> = read_message(&mut cursor).await.unwrap();
        assert!(result.is_none());
    }
}
