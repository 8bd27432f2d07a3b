//! Response declarations: the typestate builder (§4.4), the transport-
//! agnostic [`ResponseContent`] a content callback produces (§4.9), and the
//! type-erasure boundary ([`DynResponse`]) the dispatcher stores candidates
//! behind.

use crate::body::BodyPlan;
use crate::incident::{Incident, ProcessingFailed};
use crate::query::{Classification, GroupMatch, QueryItemGroup, RawQuery};
use std::any::Any;
use std::sync::Arc;

/// The transport-agnostic result of a content callback.
#[derive(Debug, Clone)]
pub struct ResponseContent {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ResponseContent {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }
}

/// Called when an [`Incident`] occurs, innermost handler first (§4.9,
/// §7). Returning `None` lets the incident fall through to the next
/// ancestor's handler, or the incident's `default_status` if none claims it.
pub type IncidentHandler = Arc<dyn Fn(&Incident) -> Option<ResponseContent> + Send + Sync>;

/// Called when a content callback returns `Err`, innermost first. Returning
/// `None` falls through the same way an unclaimed incident does.
pub type ErrorCallback = Arc<dyn Fn(&ProcessingFailed) -> Option<ResponseContent> + Send + Sync>;

/// What can go wrong invoking a matched response, distinguishing a header or
/// subpath transform rejecting the request (§4.8 step 2: routed through the
/// incident handler chain, like any other dispatch-time rejection) from the
/// content callback itself failing (§4.9: routed through the error-callback
/// chain instead).
#[derive(Debug)]
pub enum InvokeError {
    Transform(Incident),
    Content(ProcessingFailed),
}

/// What a content callback receives once query, headers, body and subpath
/// have all been resolved and type-checked (§4.4).
pub struct Input<Q, H, B, S> {
    pub query: Q,
    pub headers: H,
    pub body: B,
    pub subpath: S,
}

type HeaderTransform<H> = Arc<dyn Fn(&[(String, String)]) -> Result<H, Incident> + Send + Sync>;
type SubpathTransform<S> = Arc<dyn Fn(&[String]) -> Result<S, Incident> + Send + Sync>;
type ContentFn<Q, H, B, S> =
    Arc<dyn Fn(Input<Q, H, B, S>) -> Result<ResponseContent, ProcessingFailed> + Send + Sync>;

/// Accumulates the typed pieces of a response declaration before a content
/// callback is attached. Each modifier consumes `self` and returns a new
/// builder parameterized by the updated type, so the declaration order
/// (query, then headers, then body, then subpath, then content) is the
/// only order the type system allows — there is no way to attach a content
/// callback that doesn't match the pieces actually declared.
pub struct ResponseBuilder<Q, H, B, S> {
    query: QueryItemGroup<Q>,
    headers_transform: HeaderTransform<H>,
    body_plan: BodyPlan<B>,
    subpath_transform: SubpathTransform<S>,
    /// Set once `.subpath`/`.subpath_filter`/`.subpath_flat_map` is called:
    /// this response is a *subpath response* and only matches a strictly
    /// longer path than its group's own (§4.4). A plain declaration (the
    /// default) instead requires the remaining path to be empty, which is
    /// exactly the opposite requirement, so the two never both apply.
    subpath_requires_remainder: bool,
}

impl Default for ResponseBuilder<(), (), (), ()> {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuilder<(), (), (), ()> {
    /// A response that declares no query items, forwards no headers,
    /// prohibits a body, and accepts only an exactly-matching path (§3).
    pub fn new() -> Self {
        Self {
            query: QueryItemGroup::new(),
            headers_transform: Arc::new(|_| Ok(())),
            body_plan: BodyPlan::prohibited(),
            subpath_transform: Arc::new(|remaining| {
                if remaining.is_empty() {
                    Ok(())
                } else {
                    Err(Incident::ResponseNotFound)
                }
            }),
            subpath_requires_remainder: false,
        }
    }
}

impl<Q, H, B, S> ResponseBuilder<Q, H, B, S>
where
    Q: Send + Sync + 'static,
    H: Send + Sync + 'static,
    B: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    pub fn query<Q2>(self, query: QueryItemGroup<Q2>) -> ResponseBuilder<Q2, H, B, S> {
        ResponseBuilder {
            query,
            headers_transform: self.headers_transform,
            body_plan: self.body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
        }
    }

    pub fn request_headers<H2>(
        self,
        transform: impl Fn(&[(String, String)]) -> Result<H2, Incident> + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H2, B, S> {
        ResponseBuilder {
            query: self.query,
            headers_transform: Arc::new(transform),
            body_plan: self.body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
        }
    }

    /// Collapse the header-transform result to `H2`, infallibly (§4.4;
    /// mirrors `QueryItemGroup::map`).
    pub fn request_headers_map<H2>(
        self,
        f: impl Fn(H) -> H2 + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H2, B, S> {
        let prior = self.headers_transform;
        ResponseBuilder {
            query: self.query,
            headers_transform: Arc::new(move |headers| prior(headers).map(&f)),
            body_plan: self.body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
        }
    }

    /// Collapse the header-transform result to `H2`, allowing rejection
    /// (§4.4; mirrors `QueryItemGroup::flat_map`).
    pub fn request_headers_flat_map<H2>(
        self,
        f: impl Fn(H) -> Result<H2, Incident> + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H2, B, S> {
        let prior = self.headers_transform;
        ResponseBuilder {
            query: self.query,
            headers_transform: Arc::new(move |headers| prior(headers).and_then(&f)),
            body_plan: self.body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
        }
    }

    pub fn request_body<B2>(self, body_plan: BodyPlan<B2>) -> ResponseBuilder<Q, H, B2, S> {
        ResponseBuilder {
            query: self.query,
            headers_transform: self.headers_transform,
            body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
        }
    }

    /// Declare that this response accepts the remaining path components
    /// beyond its group's own path, transformed by `f` (§4.6). Replaces the
    /// default "remaining path must be empty" rule, making this a *subpath
    /// response*: it matches only a path strictly longer than its group's
    /// own (§4.4) — an empty remainder never reaches `f`, since that's the
    /// exact-path response's territory, not this one's.
    pub fn subpath<S2>(
        self,
        transform: impl Fn(&[String]) -> Result<S2, Incident> + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H, B, S2> {
        ResponseBuilder {
            query: self.query,
            headers_transform: self.headers_transform,
            body_plan: self.body_plan,
            subpath_transform: Arc::new(transform),
            subpath_requires_remainder: true,
        }
    }

    /// Capture the remaining path components verbatim, with no further
    /// transform.
    pub fn subpath_capture(self) -> ResponseBuilder<Q, H, B, Vec<String>> {
        self.subpath(|remaining| Ok(remaining.to_vec()))
    }

    /// Capture the remaining path components, keeping only those
    /// satisfying `pred` (§4.4). Equivalent to
    /// `.subpath_flat_map(|p| if pred(p) { Accepted(p.to_vec()) } else { Rejected })`.
    pub fn subpath_filter(
        self,
        pred: impl Fn(&[String]) -> bool + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H, B, Vec<String>> {
        self.subpath_flat_map(move |remaining| {
            if pred(remaining) {
                Classification::Accepted(remaining.to_vec())
            } else {
                Classification::Rejected
            }
        })
    }

    /// Transform the remaining path components, allowing rejection (§4.4).
    /// A rejected candidate is excluded by the dispatcher before matching
    /// ever reaches the content callback — it never surfaces as an
    /// `Incident` the way `.subpath`'s raw `Result` can.
    pub fn subpath_flat_map<S2>(
        self,
        f: impl Fn(&[String]) -> Classification<S2> + Send + Sync + 'static,
    ) -> ResponseBuilder<Q, H, B, S2> {
        self.subpath(move |remaining| match f(remaining) {
            Classification::Accepted(value) => Ok(value),
            Classification::Rejected => Err(Incident::ResponseNotFound),
        })
    }

    pub fn content(
        self,
        content: impl Fn(Input<Q, H, B, S>) -> Result<ResponseContent, ProcessingFailed>
            + Send
            + Sync
            + 'static,
    ) -> ResponseImpl<Q, H, B, S> {
        ResponseImpl {
            query: self.query,
            headers_transform: self.headers_transform,
            body_plan: self.body_plan,
            subpath_transform: self.subpath_transform,
            subpath_requires_remainder: self.subpath_requires_remainder,
            content: Arc::new(content),
            incident_handler: None,
            error_callback: None,
        }
    }
}

/// A fully declared response: query, headers, body and subpath shape all
/// fixed, plus the content callback that produces a [`ResponseContent`]
/// (§4.4).
#[derive(Clone)]
pub struct ResponseImpl<Q, H, B, S> {
    query: QueryItemGroup<Q>,
    headers_transform: HeaderTransform<H>,
    body_plan: BodyPlan<B>,
    subpath_transform: SubpathTransform<S>,
    subpath_requires_remainder: bool,
    content: ContentFn<Q, H, B, S>,
    incident_handler: Option<IncidentHandler>,
    error_callback: Option<ErrorCallback>,
}

impl<Q, H, B, S> ResponseImpl<Q, H, B, S> {
    /// Attach a handler consulted (innermost-first) before this response's
    /// ancestors when an incident occurs while serving this response (§7).
    pub fn on_incident(mut self, handler: IncidentHandler) -> Self {
        self.incident_handler = Some(handler);
        self
    }

    /// Attach a handler consulted (innermost-first) when this response's
    /// content callback returns `Err` (§4.9).
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.error_callback = Some(callback);
        self
    }

    pub fn body_limit(&self) -> u64 {
        self.body_plan.limit()
    }
}

/// What happened when a candidate's query declaration was matched against
/// one request's raw query string.
pub enum QueryOutcome {
    Matched(Box<dyn Any + Send>),
    Unmatched,
}

/// A body ingester with its output type erased, so the dispatcher can hold
/// one per in-flight request regardless of which candidate it came from.
pub trait ErasedBodyIngester: Send {
    fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), Incident>;
    fn finish(self: Box<Self>) -> Result<Box<dyn Any + Send>, Incident>;
}

impl<B: Send + 'static> ErasedBodyIngester for crate::body::BodyIngester<B> {
    fn push_chunk(&mut self, chunk: &[u8]) -> Result<(), Incident> {
        crate::body::BodyIngester::push_chunk(self, chunk)
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn Any + Send>, Incident> {
        let value = crate::body::BodyIngester::finish(*self)?;
        Ok(Box::new(value))
    }
}

/// The type-erased boundary a dispatch candidate set stores (§4.8): every
/// `ResponseImpl<Q, H, B, S>` that shares a coarse dispatch key (method,
/// host, user, path) is reachable through this one trait, with downcasts
/// always happening between values produced from the very same concrete
/// instance — `try_match_query` and `invoke` agree on `Q`/`B` by
/// construction, so a mismatched downcast can only be a bug in the
/// dispatcher itself, never a request shape problem.
pub trait DynResponse: Send + Sync {
    fn declared_query_names(&self) -> Vec<&str>;

    fn try_match_query(&self, raw: &RawQuery) -> QueryOutcome;

    fn body_limit(&self) -> u64;

    fn make_body_ingester(&self, effective_limit: u64) -> Box<dyn ErasedBodyIngester>;

    /// Whether this response's subpath declaration accepts `remaining`,
    /// without running the content callback. Used during dispatch to decide
    /// whether a path-prefix candidate participates in ambiguity detection
    /// at all (§4.6).
    fn accepts_subpath(&self, remaining: &[String]) -> bool;

    fn invoke(
        &self,
        query: Box<dyn Any + Send>,
        headers: &[(String, String)],
        body: Box<dyn Any + Send>,
        subpath: &[String],
    ) -> Result<ResponseContent, InvokeError>;

    fn incident_handler(&self) -> Option<&IncidentHandler>;

    fn error_callback(&self) -> Option<&ErrorCallback>;
}

impl<Q, H, B, S> DynResponse for ResponseImpl<Q, H, B, S>
where
    Q: Send + Sync + 'static,
    H: Send + Sync + 'static,
    B: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    fn declared_query_names(&self) -> Vec<&str> {
        self.query.declared_names()
    }

    fn try_match_query(&self, raw: &RawQuery) -> QueryOutcome {
        match self.query.try_match(raw) {
            GroupMatch::Matched(value) => QueryOutcome::Matched(Box::new(value)),
            GroupMatch::NoMatch => QueryOutcome::Unmatched,
        }
    }

    fn body_limit(&self) -> u64 {
        self.body_plan.limit()
    }

    fn make_body_ingester(&self, effective_limit: u64) -> Box<dyn ErasedBodyIngester> {
        Box::new(self.body_plan.make_ingester(effective_limit))
    }

    fn accepts_subpath(&self, remaining: &[String]) -> bool {
        if self.subpath_requires_remainder && remaining.is_empty() {
            return false;
        }
        (self.subpath_transform)(remaining).is_ok()
    }

    fn invoke(
        &self,
        query: Box<dyn Any + Send>,
        headers: &[(String, String)],
        body: Box<dyn Any + Send>,
        subpath: &[String],
    ) -> Result<ResponseContent, InvokeError> {
        if self.subpath_requires_remainder && subpath.is_empty() {
            return Err(InvokeError::Transform(Incident::ResponseNotFound));
        }
        let query = *query
            .downcast::<Q>()
            .expect("query value was produced by this same candidate's try_match_query");
        let body = *body
            .downcast::<B>()
            .expect("body value was produced by this same candidate's make_body_ingester");
        let headers = (self.headers_transform)(headers).map_err(InvokeError::Transform)?;
        let subpath = (self.subpath_transform)(subpath).map_err(InvokeError::Transform)?;
        (self.content)(Input {
            query,
            headers,
            body,
            subpath,
        })
        .map_err(InvokeError::Content)
    }

    fn incident_handler(&self) -> Option<&IncidentHandler> {
        self.incident_handler.as_ref()
    }

    fn error_callback(&self) -> Option<&ErrorCallback> {
        self.error_callback.as_ref()
    }
}
