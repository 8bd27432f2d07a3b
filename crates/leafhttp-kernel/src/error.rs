//! Crate-level build-time error type: failures that can occur while
//! resolving a declaration tree and compiling it into a [`crate::dispatch::DispatchIndex`]
//! (§7). Per-request conditions are [`crate::incident::Incident`] and
//! [`crate::incident::ProcessingFailed`] instead — those are expected,
//! routine outcomes of serving traffic, not build failures.

use thiserror::Error;

/// Something wrong with a declaration tree, caught once at startup rather
/// than per-request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// The tree declared no reachable responses at all.
    #[error("response tree has no reachable responses")]
    EmptyTree,

    /// A group's own declaration couldn't be reconciled with its ancestor
    /// chain (reserved for a future validating resolve pass).
    #[error("invalid response tree: {0}")]
    InvalidTree(#[from] crate::group::TreeError),

    /// TLS material was missing or malformed for an endpoint that declared
    /// a secure [`crate::config::HttpVersion`].
    #[error("invalid TLS configuration for endpoint {0}: {1}")]
    InvalidTls(String, String),

    /// An internal invariant was violated while compiling the dispatch
    /// index — never expected to occur in practice, kept distinct from the
    /// declarative errors above so callers can tell "your tree is invalid"
    /// apart from "this crate has a bug".
    #[error("internal dispatch compilation error: {0}")]
    Internal(String),
}

pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_tree_wraps_the_underlying_message() {
        let tree_error = crate::group::TreeError("conflicting host declarations".to_string());
        let build_error: BuildError = tree_error.into();
        assert!(build_error.to_string().contains("conflicting host declarations"));
    }
}
