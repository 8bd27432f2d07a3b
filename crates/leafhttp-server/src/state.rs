//! Shared application state handed to every connection task.

use leafhttp_kernel::DispatchIndex;
use std::sync::Arc;

/// State shared across every accepted connection: the compiled dispatch
/// index plus the per-connection defaults each endpoint negotiated at
/// bind time (§4.10, §5).
#[derive(Clone)]
pub struct AppState {
    pub dispatch: Arc<DispatchIndex>,
    pub default_body_limit: u64,
}

impl AppState {
    pub fn new(dispatch: Arc<DispatchIndex>, default_body_limit: u64) -> Self {
        Self {
            dispatch,
            default_body_limit,
        }
    }
}
