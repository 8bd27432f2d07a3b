//! Runtime-level errors: everything that can go wrong binding and serving
//! endpoints, as distinct from the per-request [`leafhttp_kernel::Incident`]
//! taxonomy the kernel already handles (§4.10, §7).

use leafhttp_kernel::config::Endpoint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {0}:{1}: {2}")]
    Bind(String, u16, std::io::Error),

    #[error("invalid TLS configuration for endpoint {0}:{1}: {2}")]
    Tls(String, u16, rustls::Error),

    #[error("no endpoints are reachable from the declared response tree")]
    NoEndpoints,

    #[error("connection error on {0}:{1}: {2}")]
    Connection(String, u16, #[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ServerError {
    pub fn bind(endpoint: &Endpoint, source: std::io::Error) -> Self {
        ServerError::Bind(endpoint.address.clone(), endpoint.port, source)
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
