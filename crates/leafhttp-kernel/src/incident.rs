//! Per-request incidents and their default HTTP statuses (§4.9, §7).

use thiserror::Error;

/// A non-fatal per-request condition with a default HTTP status, routed
/// through user-declared incident handlers before falling back to that
/// default (§7).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Incident {
    /// No declared response matched the request at all.
    #[error("no response matched the request")]
    ResponseNotFound,

    /// Two or more candidates survived the structured-query match.
    #[error("request matched more than one response")]
    AmbiguousRequest,

    /// A path/host/user/endpoint matched, but no declared response accepts
    /// this HTTP method.
    #[error("method not allowed for this path")]
    MethodNotAllowed,

    /// A response's header transform returned an error.
    #[error("invalid request headers: {0}")]
    InvalidHeaders(String),

    /// The body exceeded its effective byte limit.
    #[error("request body exceeded the configured length limit")]
    ContentTooLarge,

    /// The body plan's decode step failed (malformed JSON, etc.).
    #[error("malformed request body")]
    BadRequest,
}

impl Incident {
    /// The status sent when no incident handler on the chain produces a
    /// response for this incident (§7).
    pub fn default_status(&self) -> u16 {
        match self {
            Incident::ResponseNotFound => 404,
            Incident::AmbiguousRequest => 400,
            Incident::MethodNotAllowed => 405,
            Incident::InvalidHeaders(_) => 400,
            Incident::ContentTooLarge => 413,
            Incident::BadRequest => 400,
        }
    }
}

/// A failure raised by the user's content callback itself — fatal to the
/// request only, never to the connection (§4.9).
#[derive(Debug, Error)]
#[error("request processing failed: {0}")]
pub struct ProcessingFailed(pub String);

impl ProcessingFailed {
    pub const DEFAULT_STATUS: u16 = 500;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_statuses_match_spec_table() {
        assert_eq!(Incident::ResponseNotFound.default_status(), 404);
        assert_eq!(Incident::AmbiguousRequest.default_status(), 400);
        assert_eq!(Incident::MethodNotAllowed.default_status(), 405);
        assert_eq!(Incident::InvalidHeaders(String::new()).default_status(), 400);
        assert_eq!(Incident::ContentTooLarge.default_status(), 413);
        assert_eq!(Incident::BadRequest.default_status(), 400);
        assert_eq!(ProcessingFailed::DEFAULT_STATUS, 500);
    }
}
