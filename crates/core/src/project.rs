// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project-path helpers: basename hashing and script identifiers.
//!
//! Two projects named `app` in different directories must not collide,
//! so the proxy-id component is the basename plus a short digest of the
//! absolute path.

use crate::id::ScriptId;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Number of hex digits of the path digest kept in the id component.
const HASH_LEN: usize = 6;

/// `{basename}-{sha256(path)[..6]}` for a project directory.
pub fn basename_hash(path: &Path) -> String {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    let hex: String = digest.iter().take(HASH_LEN / 2).map(|b| format!("{b:02x}")).collect();
    format!("{basename}-{hex}")
}

/// Script id for a supervised process: `{project-basename}:{logical-name}`.
pub fn script_id(path: &Path, name: &str) -> ScriptId {
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
    ScriptId::new(format!("{basename}:{name}"))
}

/// Split a script id into `(project-basename, logical-name)`.
pub fn split_script_id(id: &ScriptId) -> Option<(&str, &str)> {
    id.as_str().split_once(':')
}

/// Parse `http(s)://host:port[/...]` into `(host, port)`.
///
/// Hand-rolled on purpose: the only URLs reaching this point are the
/// loopback ones the URL tracker already validated.
pub fn parse_host_port(url: &str) -> Option<(String, u16)> {
    let rest = url.strip_prefix("http://").or_else(|| url.strip_prefix("https://"))?;
    let authority = rest.split(['/', '?', '#']).next()?;

    // Bracketed IPv6 hosts carry the port after the closing bracket.
    if let Some(v6) = authority.strip_prefix('[') {
        let (host, tail) = v6.split_once(']')?;
        let port = tail.strip_prefix(':')?.parse().ok()?;
        return Some((format!("[{host}]"), port));
    }

    let (host, port) = authority.rsplit_once(':')?;
    let port = port.parse().ok()?;
    Some((host.to_string(), port))
}

/// `{host}-{port}` id component for a target URL, brackets stripped.
pub fn host_port_component(url: &str) -> Option<String> {
    let (host, port) = parse_host_port(url)?;
    let host = host.trim_start_matches('[').trim_end_matches(']').replace(':', ".");
    Some(format!("{host}-{port}"))
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
