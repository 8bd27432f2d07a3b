//! Converting a transport-agnostic [`ResponseContent`] into a `hyper`
//! response, and a `hyper` request's parts into the pieces dispatch needs.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use leafhttp_kernel::config::Method as KernelMethod;
use leafhttp_kernel::ResponseContent;

pub type OutgoingBody = Full<Bytes>;

/// Build the `hyper` response `content` describes. An out-of-range status
/// code falls back to 500 — it can only come from a misbehaving content
/// callback, not from request data.
pub fn to_hyper_response(content: ResponseContent) -> Response<OutgoingBody> {
    let status = StatusCode::from_u16(content.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut builder = Response::builder().status(status);
    for (name, value) in &content.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Full::new(Bytes::from(content.body)))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Full::new(Bytes::new()))
                .expect("a response with no headers always builds")
        })
}

/// Map a `hyper::Method` to the kernel's own method enum. Verbs the kernel
/// doesn't recognize (`TRACE`, `CONNECT`, arbitrary extension methods) never
/// match any declared filter, so they surface as `MethodNotAllowed`/
/// `ResponseNotFound` rather than a transport-level rejection.
pub fn to_kernel_method(method: &hyper::Method) -> Option<KernelMethod> {
    KernelMethod::from_str_ci(method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_and_headers_through() {
        let content = ResponseContent::new(201, b"created".to_vec()).with_header("x-id", "7");
        let response = to_hyper_response(content);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get("x-id").unwrap(), "7");
    }

    #[test]
    fn unrecognized_method_maps_to_none() {
        assert!(to_kernel_method(&hyper::Method::TRACE).is_none());
        assert_eq!(to_kernel_method(&hyper::Method::GET), Some(KernelMethod::Get));
    }
}
