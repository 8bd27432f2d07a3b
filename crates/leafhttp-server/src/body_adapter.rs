//! Feeding an incoming `hyper` request body into a [`RequestPipeline`] chunk
//! by chunk, so a body that trips `ContentTooLarge` is rejected as soon as
//! the limit is crossed instead of after the whole body is buffered (§4.3).

use http_body_util::BodyExt;
use hyper::body::Incoming;
use leafhttp_kernel::{RequestPipeline, ResponseContent};

/// Drain `incoming` into `pipeline`, stopping at the first chunk the
/// pipeline rejects.
pub async fn ingest(
    pipeline: &mut RequestPipeline<'_>,
    mut incoming: Incoming,
) -> Result<(), ResponseContent> {
    loop {
        let frame = match incoming.frame().await {
            Some(Ok(frame)) => frame,
            Some(Err(_)) => return Err(ResponseContent::empty(400)),
            None => return Ok(()),
        };
        if let Some(chunk) = frame.data_ref() {
            pipeline.push_body_chunk(chunk)?;
        }
    }
}
