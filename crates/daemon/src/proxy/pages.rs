// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Current-page registry: which pages the injected agent has been seen
//! on, fed by HTML responses and agent frames.

use chrono::{DateTime, Utc};
use devtool_wire::PageInfo;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default, Debug)]
pub struct PageRegistry {
    pages: Mutex<HashMap<String, PageInfo>>,
}

impl PageRegistry {
    pub fn record_hit(&self, url: &str, at: DateTime<Utc>) {
        if url.is_empty() {
            return;
        }
        let mut pages = self.pages.lock();
        let entry = pages.entry(url.to_string()).or_insert_with(|| PageInfo {
            url: url.to_string(),
            first_seen: at,
            last_seen: at,
            hits: 0,
            error_count: 0,
        });
        entry.hits += 1;
        entry.last_seen = at;
    }

    pub fn record_error(&self, url: &str, at: DateTime<Utc>) {
        if url.is_empty() {
            return;
        }
        let mut pages = self.pages.lock();
        let entry = pages.entry(url.to_string()).or_insert_with(|| PageInfo {
            url: url.to_string(),
            first_seen: at,
            last_seen: at,
            hits: 0,
            error_count: 0,
        });
        entry.error_count += 1;
        entry.last_seen = at;
    }

    /// Pages, most recently seen first.
    pub fn list(&self) -> Vec<PageInfo> {
        let mut pages: Vec<PageInfo> = self.pages.lock().values().cloned().collect();
        pages.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        pages
    }

    pub fn get(&self, url: &str) -> Option<PageInfo> {
        self.pages.lock().get(url).cloned()
    }

    /// Aggregate counts for `CURRENTPAGE SUMMARY`.
    pub fn summary(&self) -> serde_json::Value {
        let pages = self.pages.lock();
        let total_hits: u64 = pages.values().map(|p| p.hits).sum();
        let total_errors: u64 = pages.values().map(|p| p.error_count).sum();
        serde_json::json!({
            "pages": pages.len(),
            "total_hits": total_hits,
            "total_errors": total_errors,
        })
    }

    pub fn clear(&self) {
        self.pages.lock().clear();
    }
}

#[cfg(test)]
#[path = "pages_tests.rs"]
mod tests;
