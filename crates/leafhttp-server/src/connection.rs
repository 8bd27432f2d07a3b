//! Serving one accepted connection: building a `RequestContext` from a
//! `hyper` request, running it through the kernel pipeline, and turning the
//! result back into a `hyper` response (§4.10).

use std::convert::Infallible;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;

use leafhttp_kernel::config::{ConnectionConfig, Endpoint};
use leafhttp_kernel::{BeginOutcome, Path, RequestContext, RequestPipeline};

use crate::body_adapter;
use crate::listener::Stream;
use crate::response_adapter::{to_hyper_response, to_kernel_method, OutgoingBody};
use crate::state::AppState;

/// Serve every request `stream` carries until the peer closes the
/// connection, the declared idle timeout elapses, or the declared
/// per-connection request count is exceeded (§5 Timeouts). Errors
/// mid-connection are logged and dropped — a broken connection never
/// takes the listener down with it.
pub async fn serve(
    stream: Stream,
    endpoint: Arc<Endpoint>,
    state: AppState,
    scheme: &'static str,
    connection: ConnectionConfig,
) {
    let requests_served = Arc::new(AtomicU32::new(0));
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |req: Request<Incoming>| {
        let endpoint = Arc::clone(&endpoint);
        let state = state.clone();
        let requests_served = Arc::clone(&requests_served);
        async move {
            let count = requests_served.fetch_add(1, Ordering::Relaxed) + 1;
            let at_limit = connection
                .request_limit
                .is_some_and(|limit| count >= limit);
            handle(req, endpoint, state, scheme, at_limit).await
        }
    });

    let serving = AutoBuilder::new(TokioExecutor::new()).serve_connection_with_upgrades(io, service);

    let result = match connection.idle_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, serving).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!("connection closed after exceeding its idle timeout");
                return;
            }
        },
        None => serving.await,
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "connection ended with an error");
    }
}

async fn handle(
    req: Request<Incoming>,
    endpoint: Arc<Endpoint>,
    state: AppState,
    scheme: &'static str,
    at_limit: bool,
) -> Result<Response<OutgoingBody>, Infallible> {
    let mut response = handle_inner(req, endpoint, state, scheme).await?;
    if at_limit {
        response
            .headers_mut()
            .insert(hyper::header::CONNECTION, hyper::header::HeaderValue::from_static("close"));
    }
    Ok(response)
}

async fn handle_inner(
    req: Request<Incoming>,
    endpoint: Arc<Endpoint>,
    state: AppState,
    scheme: &'static str,
) -> Result<Response<OutgoingBody>, Infallible> {
    let Some(method) = to_kernel_method(req.method()) else {
        return Ok(to_hyper_response(leafhttp_kernel::ResponseContent::empty(405)));
    };

    let host = req
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(|h| h.split(':').next().unwrap_or(h).to_ascii_lowercase());
    let user = basic_auth_user(&req);
    let path = Path::from_raw(req.uri().path());
    let raw_query = leafhttp_kernel::query::RawQuery::parse(req.uri().query().unwrap_or(""));

    let ctx = RequestContext {
        endpoint: &endpoint,
        method,
        host: host.as_deref(),
        user: user.as_deref(),
        path: &path,
        raw_query: &raw_query,
    };

    match RequestPipeline::begin(&state.dispatch, &ctx, state.default_body_limit) {
        BeginOutcome::RedirectHost(target_host) => {
            let location = format!(
                "{scheme}://{target_host}:{port}{path}{query}",
                port = endpoint.port,
                path = req.uri().path(),
                query = req
                    .uri()
                    .query()
                    .map(|q| format!("?{q}"))
                    .unwrap_or_default(),
            );
            let content = leafhttp_kernel::ResponseContent::empty(301).with_header("location", location);
            Ok(to_hyper_response(content))
        }
        BeginOutcome::Failed(content) => Ok(to_hyper_response(content)),
        BeginOutcome::Pipeline(mut pipeline) => {
            let headers: Vec<(String, String)> = req
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let incoming = req.into_body();
            if let Err(content) = body_adapter::ingest(&mut pipeline, incoming).await {
                return Ok(to_hyper_response(content));
            }
            let content = pipeline.finish(&headers);
            Ok(to_hyper_response(content))
        }
    }
}

/// Surface the URL user component to the dispatcher by reading it out of
/// HTTP Basic credentials — the only place a `user@host` URL component
/// actually travels once a user agent sends the request (§1 Non-goals: "any
/// authentication beyond surfacing the URL user component").
fn basic_auth_user(req: &Request<Incoming>) -> Option<String> {
    let header = req.headers().get(hyper::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = base64_decode(encoded)?;
    let text = String::from_utf8(decoded).ok()?;
    text.split_once(':').map(|(user, _pass)| user.to_string())
}

/// Minimal RFC 4648 base64 decoder sized for Basic-auth credential strings;
/// no padding-less or URL-safe variants since browsers never send those here.
fn base64_decode(input: &str) -> Option<Vec<u8>> {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let input = input.trim_end_matches('=');
    let mut out = Vec::with_capacity(input.len() * 3 / 4);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for byte in input.bytes() {
        let value = ALPHABET.iter().position(|&c| c == byte)? as u32;
        buffer = (buffer << 6) | value;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}
