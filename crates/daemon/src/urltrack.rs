// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! URL tracker: scans fresh supervisor output for dev-server URLs.
//!
//! Only loopback binds are matched. Network-IP binds (192.168.x, 10.x)
//! are deliberately ignored - dev servers print both, and proxying the
//! mobile-network bind would create a duplicate proxy per server.

use crate::event_bus::EventBus;
use crate::supervisor::{ProcessEntry, Supervisor};
use devtool_core::{Event, ScriptId};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Per-process scan budget, counted from process start.
pub const SCAN_BYTE_CAP: u64 = 8 * 1024;

/// Path segments that mark a URL as an endpoint, not a dev server.
const REJECT_SEGMENTS: &[&str] =
    &["/api/", "/.well-known/", "/static/", "/node_modules/", "/assets/", "/__vite"];

/// Punctuation commonly stuck to the end of a printed URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '\'', '"'];

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a tested constant
        let re = Regex::new(
            r#"https?://(localhost|127\.0\.0\.1|0\.0\.0\.0|\[::1\]):\d+[^\s)\]}'"<>]*"#,
        )
        .unwrap();
        re
    })
}

/// Extract candidate dev-server URLs from one output line.
pub fn extract_urls(line: &str) -> Vec<String> {
    let mut found = Vec::new();
    for m in url_pattern().find_iter(line) {
        let url = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if url.contains('?') {
            continue;
        }
        if REJECT_SEGMENTS.iter().any(|seg| url.contains(seg)) {
            continue;
        }
        if !found.iter().any(|f| f == url) {
            found.push(url.to_string());
        }
    }
    found
}

/// Periodic scanner over every running process's new output.
pub struct UrlTracker {
    supervisor: Arc<Supervisor>,
    bus: EventBus,
    seen_running: parking_lot::Mutex<HashSet<ScriptId>>,
}

impl UrlTracker {
    pub fn new(supervisor: Arc<Supervisor>, bus: EventBus) -> Self {
        Self { supervisor, bus, seen_running: parking_lot::Mutex::new(HashSet::new()) }
    }

    /// Scan loop; runs until cancelled.
    pub async fn run(self: Arc<Self>, token: CancellationToken, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => self.scan_once(),
            }
        }
        debug!("url tracker stopped");
    }

    /// One pass over all running processes. Public for tests.
    pub fn scan_once(&self) {
        let running = self.supervisor.running();

        // Emit ScriptStopped for processes that left the running set.
        {
            let current: HashSet<ScriptId> = running.iter().map(|e| e.id.clone()).collect();
            let mut seen = self.seen_running.lock();
            for gone in seen.difference(&current) {
                info!(script = %gone, "script stopped");
                self.bus.send(Event::ScriptStopped { script_id: gone.clone() });
            }
            *seen = current;
        }

        for entry in running {
            self.scan_process(&entry);
        }
    }

    fn scan_process(&self, entry: &Arc<ProcessEntry>) {
        // Take the cursor under the lock, scan outside it.
        let (cursor, mut bytes_scanned) = {
            let scan = entry.scan.lock();
            if scan.bytes_scanned >= SCAN_BYTE_CAP {
                return;
            }
            (scan.frame_cursor, scan.bytes_scanned)
        };

        let (frames, next_cursor) = entry.output.snapshot_from(cursor);
        let matchers = &entry.config.line_matchers;

        for frame in &frames {
            if bytes_scanned >= SCAN_BYTE_CAP {
                break;
            }
            bytes_scanned += frame.text.len() as u64 + 1;

            if !matchers.is_empty() && !matchers.iter().any(|m| frame.text.contains(m)) {
                continue;
            }

            for url in extract_urls(&frame.text) {
                if entry.push_url(&url) {
                    info!(script = %entry.id, url = %url, "detected dev-server url");
                    self.bus.send(Event::UrlDetected {
                        script_id: entry.id.clone(),
                        url,
                        path: entry.config.project_path.clone(),
                    });
                }
            }
        }

        let mut scan = entry.scan.lock();
        scan.frame_cursor = next_cursor;
        scan.bytes_scanned = bytes_scanned;
    }
}

#[cfg(test)]
#[path = "urltrack_tests.rs"]
mod tests;
