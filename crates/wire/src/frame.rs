// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket framing: line + length-prefixed payload IO with timeouts.

use crate::request::{self, Payload, PayloadKind, Request};
use crate::response::Response;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Maximum payload frame size (32 MB - screenshots are the ceiling).
pub const MAX_FRAME_SIZE: usize = 32 * 1024 * 1024;

/// Default IPC timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read one `\n`-terminated line, without the terminator.
async fn read_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Result<String, ProtocolError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

async fn read_exact_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    len: usize,
) -> Result<Vec<u8>, ProtocolError> {
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
    }
    let mut buf = vec![0u8; len];
    match reader.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => Err(ProtocolError::Io(e)),
    }
}

async fn read_request_inner<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> Result<Request, ProtocolError> {
    let line = read_line(reader).await?;
    let (mut request, frame) = request::parse_line(&line)?;

    if let Some((kind, len)) = frame {
        let bytes = read_exact_frame(reader, len).await?;
        request.payload = Some(match kind {
            PayloadKind::Json => Payload::Json(serde_json::from_slice(&bytes)?),
            PayloadKind::Data => Payload::Data(bytes),
        });
    }

    Ok(request)
}

/// Read a request with timeout.
pub async fn read_request<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    tokio::time::timeout(timeout, read_request_inner(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Write a request (line plus optional payload frame) with timeout.
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    request: &Request,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let payload_bytes = match &request.payload {
        Some(Payload::Json(value)) => Some((PayloadKind::Json, serde_json::to_vec(value)?)),
        Some(Payload::Data(bytes)) => Some((PayloadKind::Data, bytes.clone())),
        None => None,
    };
    if let Some((_, bytes)) = &payload_bytes {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
    }

    let line = request::encode_line(
        request,
        payload_bytes.as_ref().map(|(kind, bytes)| (*kind, bytes.len())),
    );

    tokio::time::timeout(timeout, async {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if let Some((_, bytes)) = &payload_bytes {
            writer.write_all(bytes).await?;
        }
        writer.flush().await?;
        Ok::<_, ProtocolError>(())
    })
    .await
    .map_err(|_| ProtocolError::Timeout)?
}

/// Write a response with timeout.
pub async fn write_response<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let (header, payload) = response.encode();
    if let Some(bytes) = &payload {
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
    }

    tokio::time::timeout(timeout, async {
        writer.write_all(header.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        if let Some(bytes) = &payload {
            writer.write_all(bytes).await?;
        }
        writer.flush().await?;
        Ok::<_, ProtocolError>(())
    })
    .await
    .map_err(|_| ProtocolError::Timeout)?
}

async fn read_response_inner<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
) -> Result<Response, ProtocolError> {
    let line = read_line(reader).await?;
    let (response, payload_len) = Response::parse_header(&line)?;
    match (response, payload_len) {
        (resp, None) => Ok(resp),
        (Response::Json(_), Some(len)) => {
            let bytes = read_exact_frame(reader, len).await?;
            Ok(Response::Json(serde_json::from_slice(&bytes)?))
        }
        (Response::Data(_), Some(len)) => {
            let bytes = read_exact_frame(reader, len).await?;
            Ok(Response::Data(bytes))
        }
        (resp, Some(_)) => Ok(resp),
    }
}

/// Read a response with timeout. Client side of the protocol.
pub async fn read_response<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Response, ProtocolError> {
    tokio::time::timeout(timeout, read_response_inner(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
