//! Shared primitives used across Storefacet crates.

use core::fmt;

/// Result alias used across the workspace.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error carried through the facet sync stack.
///
/// `code` is a stable dotted identifier (`net.fetch.status`, `dom.target_missing`, ...)
/// that callers match on; `message` is for humans and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncError {
    pub code: &'static str,
    pub message: String,
}

impl SyncError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns true when the code belongs to the given dotted namespace (`"net"`, `"dom"`).
    pub fn is_in(&self, namespace: &str) -> bool {
        self.code
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for SyncError {}
