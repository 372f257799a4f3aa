// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proxy traffic log: tagged entries plus the query filter.
//!
//! The log is a sum type on purpose - widening it to free-form JSON
//! would push shape validation onto every reader. The filter is a struct
//! of optional predicates; an entry matches when every *specified*
//! predicate holds.

use crate::ring::{RingBuffer, RingStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in a proxy's traffic log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    /// A forwarded HTTP request/response pair.
    Http {
        method: String,
        url: String,
        status: u16,
        request_bytes: u64,
        response_bytes: u64,
        duration_ms: u64,
        at: DateTime<Utc>,
        /// Upstream failure note (entry status is 502 when set).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// A JavaScript error reported by the injected agent.
    FrontendError {
        message: String,
        source: String,
        line: u32,
        column: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
        at: DateTime<Utc>,
    },

    /// A page-load performance sample.
    Performance {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dom_content_loaded_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        load_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_paint_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        first_contentful_paint_ms: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource_count: Option<u32>,
        at: DateTime<Utc>,
    },

    /// A log line forwarded from the browser console.
    CustomLog {
        level: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        at: DateTime<Utc>,
    },

    /// A screenshot captured by the injected agent.
    Screenshot {
        name: String,
        /// Base64-encoded PNG.
        data: String,
        width: u32,
        height: u32,
        at: DateTime<Utc>,
    },

    /// Result of a daemon-initiated remote execution.
    Execution {
        exec_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
        at: DateTime<Utc>,
    },
}

impl LogEntry {
    pub fn kind_str(&self) -> &'static str {
        match self {
            LogEntry::Http { .. } => "http",
            LogEntry::FrontendError { .. } => "frontend_error",
            LogEntry::Performance { .. } => "performance",
            LogEntry::CustomLog { .. } => "custom_log",
            LogEntry::Screenshot { .. } => "screenshot",
            LogEntry::Execution { .. } => "execution",
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Http { at, .. }
            | LogEntry::FrontendError { at, .. }
            | LogEntry::Performance { at, .. }
            | LogEntry::CustomLog { at, .. }
            | LogEntry::Screenshot { at, .. }
            | LogEntry::Execution { at, .. } => *at,
        }
    }

    /// URL-ish field for substring filtering, when the variant has one.
    fn url(&self) -> Option<&str> {
        match self {
            LogEntry::Http { url, .. } | LogEntry::Performance { url, .. } => Some(url),
            LogEntry::FrontendError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Filter for [`TrafficLog::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub methods: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_codes: Option<Vec<u16>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LogFilter {
    /// True when every specified predicate holds for `entry`.
    ///
    /// `methods` and `status_codes` only ever match HTTP entries;
    /// specifying them excludes every other variant.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(types) = &self.types {
            if !types.iter().any(|t| t == entry.kind_str()) {
                return false;
            }
        }
        if let Some(methods) = &self.methods {
            match entry {
                LogEntry::Http { method, .. } => {
                    if !methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        if let Some(codes) = &self.status_codes {
            match entry {
                LogEntry::Http { status, .. } => {
                    if !codes.contains(status) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        if let Some(pattern) = &self.url_pattern {
            match entry.url() {
                Some(url) if url.contains(pattern.as_str()) => {}
                _ => return false,
            }
        }
        if let Some(since) = self.since {
            if entry.at() < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.at() > until {
                return false;
            }
        }
        true
    }
}

/// Bounded per-proxy traffic log.
#[derive(Debug)]
pub struct TrafficLog {
    ring: RingBuffer<LogEntry>,
}

impl TrafficLog {
    pub fn new(max_entries: usize) -> Self {
        Self { ring: RingBuffer::new(max_entries) }
    }

    pub fn push(&self, entry: LogEntry) {
        self.ring.push(entry);
    }

    /// Entries matching `filter`, chronological, bounded to the
    /// `limit` most recent matches.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEntry> {
        let mut matched: Vec<LogEntry> =
            self.ring.snapshot().into_iter().filter(|e| filter.matches(e)).collect();
        if let Some(limit) = filter.limit {
            if matched.len() > limit {
                matched.drain(..matched.len() - limit);
            }
        }
        matched
    }

    pub fn stats(&self) -> RingStats {
        self.ring.stats()
    }

    pub fn clear(&self) {
        self.ring.clear();
    }
}

#[cfg(test)]
#[path = "traffic_tests.rs"]
mod tests;
