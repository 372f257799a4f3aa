// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes for daemon-owned resources.
//!
//! All identifiers are plain strings on the wire; the newtypes exist so
//! a proxy id can never be passed where a session code is expected.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

macro_rules! string_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Compound proxy identifier: `{basename-hash}:{logical-name}:{host-port}`.
    ///
    /// Every `:`-delimited component is a valid fuzzy-lookup key.
    pub struct ProxyId;
}

string_id! {
    /// Supervised-process identifier: `{project-basename}:{logical-name}`.
    pub struct ScriptId;
}

string_id! {
    /// Human-readable session code like `claude-3`.
    pub struct SessionCode;
}

string_id! {
    /// Scheduled-task identifier, `task-` prefixed nanoid.
    pub struct TaskId;
}

impl ProxyId {
    /// Iterate the `:`-delimited components of the compound id.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split(':')
    }

    /// True when `query` equals the full id or any single component.
    pub fn matches(&self, query: &str) -> bool {
        self.0 == query || self.components().any(|c| c == query)
    }
}

impl TaskId {
    /// Generate a fresh task id.
    pub fn generate() -> Self {
        Self(format!("task-{}", nanoid::nanoid!(10)))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
