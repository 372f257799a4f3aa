// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use devtool_core::DaemonError;

#[test]
fn ok_encodes_bare_line() {
    let (header, payload) = Response::Ok.encode();
    assert_eq!(header, "OK");
    assert!(payload.is_none());
}

#[test]
fn json_encodes_length_prefixed() {
    let value = serde_json::json!({"a": 1});
    let (header, payload) = Response::Json(value.clone()).encode();
    let bytes = payload.unwrap();
    assert_eq!(header, format!("JSON {}", bytes.len()));
    assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(), value);
}

#[test]
fn data_encodes_raw_bytes() {
    let (header, payload) = Response::Data(vec![1, 2, 3]).encode();
    assert_eq!(header, "DATA 3");
    assert_eq!(payload.unwrap(), vec![1, 2, 3]);
}

#[test]
fn err_encodes_kind_and_message() {
    let response = Response::err(ErrorKind::NotFound, "no proxy named dev");
    let (header, payload) = response.encode();
    assert_eq!(header, "ERR not-found no proxy named dev");
    assert!(payload.is_none());
}

#[test]
fn err_message_newlines_are_flattened() {
    let response = Response::err(ErrorKind::Internal, "line one\nline two");
    let (header, _) = response.encode();
    assert!(!header.contains('\n'));
}

#[test]
fn parse_header_round_trips_err() {
    let (parsed, payload) = Response::parse_header("ERR ambiguous dev matches 2 proxies").unwrap();
    assert!(payload.is_none());
    assert_eq!(
        parsed,
        Response::Err {
            kind: ErrorKind::Ambiguous,
            message: "dev matches 2 proxies".to_string()
        }
    );
}

#[test]
fn parse_header_announces_payload() {
    let (_, payload) = Response::parse_header("JSON 17").unwrap();
    assert_eq!(payload, Some(17));

    let (_, payload) = Response::parse_header("DATA 4").unwrap();
    assert_eq!(payload, Some(4));
}

#[test]
fn parse_header_rejects_garbage() {
    assert!(Response::parse_header("YEP").is_err());
    assert!(Response::parse_header("ERR catastrophic everything").is_err());
    assert!(Response::parse_header("JSON many").is_err());
}

#[test]
fn daemon_error_converts_to_err_response() {
    let response: Response = DaemonError::exists("proxy dev already running").into();
    assert_eq!(
        response,
        Response::Err { kind: ErrorKind::Exists, message: "proxy dev already running".to_string() }
    );
}
