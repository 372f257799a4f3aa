// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response encoding: `OK`, `JSON <n>` + payload, `DATA <n>` + payload,
//! `ERR <kind> <message>`.

use crate::frame::ProtocolError;
use devtool_core::{DaemonError, ErrorKind};
use serde::Serialize;

/// A daemon response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Json(serde_json::Value),
    Data(Vec<u8>),
    Err { kind: ErrorKind, message: String },
}

impl Response {
    /// Serialize any DTO into a `JSON` response.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Response::Json(v),
            Err(e) => Response::Err {
                kind: ErrorKind::Internal,
                message: format!("response serialization failed: {e}"),
            },
        }
    }

    pub fn err(kind: ErrorKind, message: impl Into<String>) -> Self {
        Response::Err { kind, message: message.into() }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, Response::Err { .. })
    }

    /// Header line plus optional payload bytes.
    pub(crate) fn encode(&self) -> (String, Option<Vec<u8>>) {
        match self {
            Response::Ok => ("OK".to_string(), None),
            Response::Json(value) => {
                let bytes = serde_json::to_vec(value).unwrap_or_else(|_| b"null".to_vec());
                (format!("JSON {}", bytes.len()), Some(bytes))
            }
            Response::Data(bytes) => (format!("DATA {}", bytes.len()), Some(bytes.clone())),
            Response::Err { kind, message } => {
                // The message must stay on one line.
                let message = message.replace(['\n', '\r'], " ");
                (format!("ERR {kind} {message}"), None)
            }
        }
    }

    /// Parse a header line; `Ok(Some(n))` means `n` payload bytes follow.
    pub(crate) fn parse_header(line: &str) -> Result<(Self, Option<usize>), ProtocolError> {
        let mut words = line.splitn(3, ' ');
        match words.next() {
            Some("OK") => Ok((Response::Ok, None)),
            Some("JSON") => {
                let n = parse_size(words.next())?;
                Ok((Response::Json(serde_json::Value::Null), Some(n)))
            }
            Some("DATA") => {
                let n = parse_size(words.next())?;
                Ok((Response::Data(Vec::new()), Some(n)))
            }
            Some("ERR") => {
                let kind_word = words.next().ok_or_else(|| {
                    ProtocolError::Malformed("ERR without a kind".to_string())
                })?;
                let kind = ErrorKind::parse(kind_word).ok_or_else(|| {
                    ProtocolError::Malformed(format!("unknown error kind {kind_word:?}"))
                })?;
                let message = words.next().unwrap_or_default().to_string();
                Ok((Response::Err { kind, message }, None))
            }
            _ => Err(ProtocolError::Malformed(format!("bad response line {line:?}"))),
        }
    }
}

fn parse_size(word: Option<&str>) -> Result<usize, ProtocolError> {
    word.and_then(|w| w.parse().ok())
        .ok_or_else(|| ProtocolError::Malformed("bad payload size".to_string()))
}

impl From<DaemonError> for Response {
    fn from(e: DaemonError) -> Self {
        Response::Err { kind: e.kind, message: e.message }
    }
}

impl<T: Serialize> From<Result<T, DaemonError>> for Response {
    fn from(result: Result<T, DaemonError>) -> Self {
        match result {
            Ok(value) => Response::json(&value),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
