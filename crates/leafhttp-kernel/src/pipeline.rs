//! Request pipeline orchestration (§4.8): dispatch, body ingestion, and
//! invocation, with the incident/error handler chain consulted innermost
//! first at every stage that can fail (§7).

use crate::cascade::GroupAttributes;
use crate::dispatch::{DispatchIndex, DispatchOutcome, RequestContext};
use crate::incident::{Incident, ProcessingFailed};
use crate::response::{InvokeError, ResponseContent};

/// Try every handler in `attrs`'s chain, innermost (last-appended) first;
/// fall back to the incident's default status if none claims it (§7).
fn respond_to_incident(attrs: &GroupAttributes, incident: &Incident) -> ResponseContent {
    for handler in attrs.incident_handlers.iter().rev() {
        if let Some(content) = handler(incident) {
            return content;
        }
    }
    tracing::debug!(%incident, status = incident.default_status(), "incident unhandled, using default status");
    ResponseContent::empty(incident.default_status())
}

fn respond_to_error(attrs: &GroupAttributes, failure: &ProcessingFailed) -> ResponseContent {
    for callback in attrs.error_callbacks.iter().rev() {
        if let Some(content) = callback(failure) {
            return content;
        }
    }
    tracing::error!(error = %failure, "content callback failed, using default status");
    ResponseContent::empty(ProcessingFailed::DEFAULT_STATUS)
}

/// A request in flight: dispatch has already chosen a response, and the
/// pipeline is waiting for body chunks before it can invoke the content
/// callback. The transport adapter owns when chunks arrive (§4.10); this
/// type owns what happens to them.
pub struct RequestPipeline<'a> {
    response: &'a dyn crate::response::DynResponse,
    attributes: &'a GroupAttributes,
    query: Box<dyn std::any::Any + Send>,
    remaining_path: Vec<String>,
    ingester: Box<dyn crate::response::ErasedBodyIngester>,
}

/// What beginning a request produced: a pipeline ready for body chunks, a
/// host redirect the transport adapter must turn into a `Location` header
/// (the kernel doesn't know the connection's scheme, so it can't build the
/// URL itself), or a final response because dispatch failed outright.
pub enum BeginOutcome<'a> {
    Pipeline(RequestPipeline<'a>),
    RedirectHost(String),
    Failed(ResponseContent),
}

impl<'a> RequestPipeline<'a> {
    /// Dispatch a request. On failure there is no chosen response, so only
    /// the tree root's incident chain (if any) gets a chance to customize
    /// the result (§7).
    pub fn begin(
        index: &'a DispatchIndex,
        ctx: &RequestContext<'_>,
        endpoint_default_body_limit: u64,
    ) -> BeginOutcome<'a> {
        let matched = match index.resolve(ctx) {
            Ok(DispatchOutcome::RedirectHost(host)) => return BeginOutcome::RedirectHost(host),
            Ok(DispatchOutcome::Matched(matched)) => matched,
            Err(incident) => {
                return BeginOutcome::Failed(respond_to_incident(index.root_attributes(), &incident));
            }
        };

        let limit = matched
            .response
            .body_limit()
            .min(matched.attributes.body_length_limit.unwrap_or(u64::MAX))
            .min(endpoint_default_body_limit);
        let ingester = matched.response.make_body_ingester(limit);

        BeginOutcome::Pipeline(Self {
            response: matched.response,
            attributes: matched.attributes,
            query: matched.query,
            remaining_path: matched.remaining_path,
            ingester,
        })
    }

    /// Feed one body chunk. On `Err`, the caller should stop reading the
    /// body and send the returned content immediately (§4.3 incident
    /// ContentTooLarge is reported as soon as the limit is first crossed).
    pub fn push_body_chunk(&mut self, chunk: &[u8]) -> Result<(), ResponseContent> {
        self.ingester
            .push_chunk(chunk)
            .map_err(|incident| respond_to_incident(self.attributes, &incident))
    }

    /// Finish ingestion and invoke the content callback.
    pub fn finish(self, headers: &[(String, String)]) -> ResponseContent {
        let body = match self.ingester.finish() {
            Ok(body) => body,
            Err(incident) => return respond_to_incident(self.attributes, &incident),
        };
        match self
            .response
            .invoke(self.query, headers, body, &self.remaining_path)
        {
            Ok(content) => content,
            Err(InvokeError::Transform(incident)) => respond_to_incident(self.attributes, &incident),
            Err(InvokeError::Content(failure)) => respond_to_error(self.attributes, &failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoint, HttpConfig, Method};
    use crate::group::RootGroup;
    use crate::incident::Incident;
    use crate::path::Path;
    use crate::query::RawQuery;
    use crate::response::{Input, ResponseBuilder, ResponseContent};
    use std::sync::Arc;

    fn simple_index() -> (DispatchIndex, Endpoint) {
        let endpoint = Endpoint::new("0.0.0.0", 8080);
        let tree = RootGroup::new()
            .endpoint(endpoint.clone(), HttpConfig::http1())
            .on_incident(Arc::new(|incident: &Incident| {
                matches!(incident, Incident::ResponseNotFound)
                    .then(|| ResponseContent::new(404, "custom not found".to_string()))
            }))
            .child(
                ResponseBuilder::new()
                    .request_body(crate::body::BodyPlan::collect(1024))
                    .content(|input: Input<(), (), Vec<u8>, ()>| {
                        Ok(ResponseContent::new(200, input.body))
                    }),
            );
        (DispatchIndex::compile(tree.resolve()), endpoint)
    }

    #[test]
    fn full_pipeline_ingests_body_and_invokes_content() {
        let (index, endpoint) = simple_index();
        let raw = RawQuery::parse("");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::root(),
            raw_query: &raw,
        };
        let mut pipeline = match RequestPipeline::begin(&index, &ctx, 4096) {
            BeginOutcome::Pipeline(p) => p,
            _ => panic!("expected a pipeline"),
        };
        pipeline.push_body_chunk(b"hello").unwrap();
        let content = pipeline.finish(&[]);
        assert_eq!(content.body, b"hello".to_vec());
    }

    #[test]
    fn dispatch_failure_consults_the_root_incident_chain() {
        let (index, endpoint) = simple_index();
        let raw = RawQuery::parse("");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::from_raw("nonexistent"),
            raw_query: &raw,
        };
        let content = match RequestPipeline::begin(&index, &ctx, 4096) {
            BeginOutcome::Failed(content) => content,
            _ => panic!("expected dispatch to fail"),
        };
        assert_eq!(content.body, b"custom not found".to_vec());
    }
}
