//! Transport-agnostic core: declare a tree of response declarations,
//! resolve it, compile it into a dispatch index, and run requests through
//! it. Everything that talks to an actual network socket lives in the
//! `leafhttp-server` crate instead (§1).

pub mod body;
pub mod cascade;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod group;
pub mod incident;
pub mod path;
pub mod pipeline;
pub mod query;
pub mod response;

pub use cascade::{GroupAttributes, GroupDecl};
pub use config::{ConnectionConfig, Endpoint, HttpConfig, HttpVersion, Method, TlsConfig};
pub use dispatch::{DispatchIndex, DispatchOutcome, MatchedCandidate, RequestContext};
pub use error::{BuildError, BuildResult};
pub use group::{for_each, if_then, Child, InnerGroup, RootGroup, TreeError};
pub use incident::{Incident, ProcessingFailed};
pub use path::Path;
pub use pipeline::{BeginOutcome, RequestPipeline};
pub use response::{
    DynResponse, ErrorCallback, IncidentHandler, Input, InvokeError, ResponseBuilder,
    ResponseContent, ResponseImpl,
};
