// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request line parsing: verbs, sub-verbs, arguments, payload markers.
//!
//! The request line is tokenized with double-quote quoting so message
//! texts ride inline. An unquoted trailing `JSON <n>` / `DATA <n>` pair
//! announces a payload of exactly `n` bytes following the newline.

use crate::frame::ProtocolError;
use serde::{Deserialize, Serialize};

macro_rules! subverb {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $( $variant:ident => $word:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $word, )+
                }
            }

            pub fn parse(s: &str) -> Option<Self> {
                $( if s.eq_ignore_ascii_case($word) { return Some(Self::$variant); } )+
                None
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

subverb! {
    /// `PROC` sub-verbs.
    pub enum ProcCmd {
        Status => "STATUS",
        Output => "OUTPUT",
        Stop => "STOP",
        Restart => "RESTART",
        List => "LIST",
        CleanupPort => "CLEANUP-PORT",
    }
}

subverb! {
    /// `PROXY` sub-verbs.
    pub enum ProxyCmd {
        Start => "START",
        Stop => "STOP",
        Status => "STATUS",
        List => "LIST",
        Restart => "RESTART",
        Exec => "EXEC",
        Toast => "TOAST",
    }
}

subverb! {
    /// `PROXYLOG` sub-verbs.
    pub enum ProxyLogCmd {
        Query => "QUERY",
        Stats => "STATS",
        Summary => "SUMMARY",
        Clear => "CLEAR",
    }
}

subverb! {
    /// `CHAOS` sub-verbs (implementation delegated to the fault engine).
    pub enum ChaosCmd {
        Enable => "ENABLE",
        Disable => "DISABLE",
        Status => "STATUS",
        Stats => "STATS",
        Preset => "PRESET",
        Set => "SET",
        AddRule => "ADD-RULE",
        RemoveRule => "REMOVE-RULE",
        ListRules => "LIST-RULES",
        ListPresets => "LIST-PRESETS",
        Clear => "CLEAR",
    }
}

subverb! {
    /// `SESSION` sub-verbs.
    pub enum SessionCmd {
        Register => "REGISTER",
        Unregister => "UNREGISTER",
        List => "LIST",
        Get => "GET",
        Heartbeat => "HEARTBEAT",
        GenerateCode => "GENERATE-CODE",
        Find => "FIND",
        Send => "SEND",
        Schedule => "SCHEDULE",
        Cancel => "CANCEL",
        Tasks => "TASKS",
        Attach => "ATTACH",
    }
}

subverb! {
    /// `TUNNEL` sub-verbs (implementation delegated to tunnel binaries).
    pub enum TunnelCmd {
        Start => "START",
        Stop => "STOP",
        Status => "STATUS",
        List => "LIST",
    }
}

subverb! {
    /// `OVERLAY` sub-verbs.
    pub enum OverlayCmd {
        Set => "SET",
        Get => "GET",
        Clear => "CLEAR",
        Activity => "ACTIVITY",
    }
}

subverb! {
    /// `CURRENTPAGE` sub-verbs.
    pub enum PageCmd {
        List => "LIST",
        Get => "GET",
        Summary => "SUMMARY",
        Clear => "CLEAR",
    }
}

subverb! {
    /// `STORE` sub-verbs.
    pub enum StoreCmd {
        Get => "GET",
        Set => "SET",
        Delete => "DELETE",
        List => "LIST",
        Clear => "CLEAR",
        GetAll => "GETALL",
    }
}

/// Every verb the daemon dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verb {
    Detect,
    Info,
    Ping,
    Run,
    Proc(ProcCmd),
    Proxy(ProxyCmd),
    ProxyLog(ProxyLogCmd),
    Chaos(ChaosCmd),
    Session(SessionCmd),
    Tunnel(TunnelCmd),
    Overlay(OverlayCmd),
    CurrentPage(PageCmd),
    Store(StoreCmd),
}

impl Verb {
    /// Parse a verb, consuming the sub-verb token when the family has one.
    ///
    /// Returns the verb and how many tokens were consumed (1 or 2).
    pub fn parse(verb: &str, subverb: Option<&str>) -> Result<(Self, usize), ProtocolError> {
        let bare = |v: Verb| Ok((v, 1));
        let sub = |parsed: Option<Verb>| match parsed {
            Some(v) => Ok((v, 2)),
            None => Err(ProtocolError::Malformed(match subverb {
                Some(s) => format!("unknown sub-verb {s:?} for {verb}"),
                None => format!("{verb} requires a sub-verb"),
            })),
        };

        match verb.to_ascii_uppercase().as_str() {
            "DETECT" => bare(Verb::Detect),
            "INFO" => bare(Verb::Info),
            "PING" => bare(Verb::Ping),
            "RUN" => bare(Verb::Run),
            "PROC" => sub(subverb.and_then(ProcCmd::parse).map(Verb::Proc)),
            "PROXY" => sub(subverb.and_then(ProxyCmd::parse).map(Verb::Proxy)),
            "PROXYLOG" => sub(subverb.and_then(ProxyLogCmd::parse).map(Verb::ProxyLog)),
            "CHAOS" => sub(subverb.and_then(ChaosCmd::parse).map(Verb::Chaos)),
            "SESSION" => sub(subverb.and_then(SessionCmd::parse).map(Verb::Session)),
            "TUNNEL" => sub(subverb.and_then(TunnelCmd::parse).map(Verb::Tunnel)),
            "OVERLAY" => sub(subverb.and_then(OverlayCmd::parse).map(Verb::Overlay)),
            "CURRENTPAGE" => sub(subverb.and_then(PageCmd::parse).map(Verb::CurrentPage)),
            "STORE" => sub(subverb.and_then(StoreCmd::parse).map(Verb::Store)),
            other => Err(ProtocolError::Malformed(format!("unknown verb {other:?}"))),
        }
    }

    /// Wire words for this verb (`["PROC", "STATUS"]`, `["PING"]`, …).
    pub fn wire_words(&self) -> Vec<&'static str> {
        match self {
            Verb::Detect => vec!["DETECT"],
            Verb::Info => vec!["INFO"],
            Verb::Ping => vec!["PING"],
            Verb::Run => vec!["RUN"],
            Verb::Proc(c) => vec!["PROC", c.as_str()],
            Verb::Proxy(c) => vec!["PROXY", c.as_str()],
            Verb::ProxyLog(c) => vec!["PROXYLOG", c.as_str()],
            Verb::Chaos(c) => vec!["CHAOS", c.as_str()],
            Verb::Session(c) => vec!["SESSION", c.as_str()],
            Verb::Tunnel(c) => vec!["TUNNEL", c.as_str()],
            Verb::Overlay(c) => vec!["OVERLAY", c.as_str()],
            Verb::CurrentPage(c) => vec!["CURRENTPAGE", c.as_str()],
            Verb::Store(c) => vec!["STORE", c.as_str()],
        }
    }
}

/// Optional request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Data(Vec<u8>),
}

/// A parsed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub verb: Verb,
    pub args: Vec<String>,
    pub payload: Option<Payload>,
}

impl Request {
    pub fn new(verb: Verb) -> Self {
        Self { verb, args: Vec::new(), payload: None }
    }

    pub fn with_args(verb: Verb, args: Vec<String>) -> Self {
        Self { verb, args, payload: None }
    }

    pub fn with_json(verb: Verb, args: Vec<String>, json: serde_json::Value) -> Self {
        Self { verb, args, payload: Some(Payload::Json(json)) }
    }

    /// Positional argument or an invalid-arg protocol error.
    pub fn arg(&self, index: usize) -> Result<&str, ProtocolError> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            ProtocolError::Malformed(format!("missing argument {}", index + 1))
        })
    }

    /// The JSON payload, if one was sent.
    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.payload {
            Some(Payload::Json(v)) => Some(v),
            _ => None,
        }
    }
}

/// A token plus whether it was double-quoted on the wire.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub text: String,
    pub quoted: bool,
}

/// Tokenize a request line. Double quotes group words; `\"` and `\\`
/// escape inside quotes.
pub(crate) fn tokenize(line: &str) -> Result<Vec<Token>, ProtocolError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some(e @ ('"' | '\\')) => text.push(e),
                        Some(e) => {
                            text.push('\\');
                            text.push(e);
                        }
                        None => {
                            return Err(ProtocolError::Malformed(
                                "dangling escape in quoted argument".to_string(),
                            ))
                        }
                    },
                    _ => text.push(c),
                }
            }
            if !closed {
                return Err(ProtocolError::Malformed("unterminated quote".to_string()));
            }
            tokens.push(Token { text, quoted: true });
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token { text, quoted: false });
        }
    }

    Ok(tokens)
}

/// Quote an argument for the wire when it needs it.
pub(crate) fn quote_arg(arg: &str) -> String {
    let needs_quoting = arg.is_empty()
        || arg.chars().any(|c| c.is_whitespace() || c == '"')
        || arg.eq_ignore_ascii_case("JSON")
        || arg.eq_ignore_ascii_case("DATA");
    if needs_quoting {
        let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        arg.to_string()
    }
}

/// Parse a tokenized request line, returning the request (without
/// payload) and the announced payload frame, if any.
pub(crate) fn parse_line(
    line: &str,
) -> Result<(Request, Option<(PayloadKind, usize)>), ProtocolError> {
    let tokens = tokenize(line)?;
    if tokens.is_empty() {
        return Err(ProtocolError::Malformed("empty request line".to_string()));
    }

    let verb_word = &tokens[0].text;
    let sub_word = tokens.get(1).filter(|t| !t.quoted).map(|t| t.text.as_str());
    let (verb, consumed) = Verb::parse(verb_word, sub_word)?;

    let mut rest: Vec<Token> = tokens.into_iter().skip(consumed).collect();

    // Unquoted trailing `JSON <n>` / `DATA <n>` announces a payload.
    let mut frame = None;
    if rest.len() >= 2 {
        let marker = &rest[rest.len() - 2];
        let size_tok = &rest[rest.len() - 1];
        if !marker.quoted && !size_tok.quoted {
            let kind = if marker.text.eq_ignore_ascii_case("JSON") {
                Some(PayloadKind::Json)
            } else if marker.text.eq_ignore_ascii_case("DATA") {
                Some(PayloadKind::Data)
            } else {
                None
            };
            if let Some(kind) = kind {
                let size: usize = size_tok.text.parse().map_err(|_| {
                    ProtocolError::Malformed(format!(
                        "bad payload size {:?}",
                        size_tok.text
                    ))
                })?;
                frame = Some((kind, size));
                rest.truncate(rest.len() - 2);
            }
        }
    }

    let args = rest.into_iter().map(|t| t.text).collect();
    Ok((Request { verb, args, payload: None }, frame))
}

/// Render the request line (payload frame marker included when present).
pub(crate) fn encode_line(request: &Request, payload_len: Option<(PayloadKind, usize)>) -> String {
    let mut parts: Vec<String> =
        request.verb.wire_words().into_iter().map(str::to_string).collect();
    parts.extend(request.args.iter().map(|a| quote_arg(a)));
    if let Some((kind, len)) = payload_len {
        parts.push(kind.marker().to_string());
        parts.push(len.to_string());
    }
    parts.join(" ")
}

/// Which payload frame kind was announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PayloadKind {
    Json,
    Data,
}

impl PayloadKind {
    pub(crate) fn marker(&self) -> &'static str {
        match self {
            PayloadKind::Json => "JSON",
            PayloadKind::Data => "DATA",
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
