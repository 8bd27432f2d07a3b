//! Compiling a resolved response tree into an efficient dispatch structure,
//! and resolving one request against it (§4.7, §4.8).
//!
//! The logical model is endpoint → method → user → host → path → query,
//! narrowing at each step. The compiled [`DispatchIndex`] realizes the one
//! expensive step (path) as a trie and leaves the rest — all cheap,
//! typically tiny-cardinality — as predicate filters applied to whatever
//! the trie narrows the candidate set down to; the net effect is the same
//! narrowing order without a six-level nested map to maintain.

mod matcher;
mod trie;

use std::any::Any;

use std::collections::HashMap;

use crate::cascade::GroupAttributes;
use crate::config::{Endpoint, HttpConfig, Method};
use crate::incident::Incident;
use crate::query::RawQuery;
use crate::response::{DynResponse, QueryOutcome};

use trie::PathTrie;

pub use matcher::{endpoint_matches, host_matches, method_matches, user_matches};

use crate::path::Path;

/// Everything about one request that dispatch needs to find its response.
pub struct RequestContext<'a> {
    pub endpoint: &'a Endpoint,
    pub method: Method,
    pub host: Option<&'a str>,
    pub user: Option<&'a str>,
    pub path: &'a Path,
    pub raw_query: &'a RawQuery,
}

/// The response a request resolved to, plus everything the request
/// pipeline needs to finish ingesting the body and invoking it (§4.8).
pub struct MatchedCandidate<'a> {
    pub response: &'a dyn DynResponse,
    pub attributes: &'a GroupAttributes,
    pub query: Box<dyn Any + Send>,
    pub remaining_path: Vec<String>,
}

/// What resolving a request against the index produced, before body
/// ingestion: either a chosen candidate, or a host redirect (§4.1, §9
/// scenario 5) — an alias host or an optional-subdomain host is never
/// itself dispatched to, only ever redirected to the primary host.
pub enum DispatchOutcome<'a> {
    Matched(MatchedCandidate<'a>),
    RedirectHost(String),
}

/// If `host` is an alias or an optional-subdomain form of one of `attrs`'s
/// primary hosts, the primary host it should redirect to. `None` if `host`
/// is itself primary, or declares no host relationship at all. Ties among
/// multiple primary hosts are broken lexicographically for determinism —
/// the hosts set carries no declared ordering.
fn redirect_target(attrs: &GroupAttributes, host: &str) -> Option<String> {
    if attrs.hosts.is_empty() || attrs.hosts.contains(host) {
        return None;
    }
    let is_alias = attrs.host_aliases.contains(host)
        || attrs.hosts.iter().any(|base| {
            attrs
                .optional_subdomains
                .iter()
                .any(|sub| host == format!("{sub}.{base}"))
        });
    if !is_alias {
        return None;
    }
    attrs.hosts.iter().min().cloned()
}

/// The compiled form of a resolved response tree (§4.7): a path trie over
/// candidate indices, plus the cascaded attributes and type-erased
/// response each index refers to.
pub struct DispatchIndex {
    trie: PathTrie,
    candidates: Vec<(GroupAttributes, Box<dyn DynResponse>)>,
    /// The root group's own attributes, consulted as the incident/error
    /// chain when dispatch fails before any candidate is chosen (§7) — a
    /// root-level `.on_incident()` can still customize a 404 even though
    /// no specific response's chain applies.
    root_attributes: GroupAttributes,
}

impl DispatchIndex {
    pub fn compile(
        resolved: (GroupAttributes, Vec<(GroupAttributes, Box<dyn DynResponse>)>),
    ) -> Self {
        let (root_attributes, candidates) = resolved;
        let mut trie = PathTrie::new();
        for (idx, (attrs, _)) in candidates.iter().enumerate() {
            trie.insert(&attrs.path, idx);
        }
        Self {
            trie,
            candidates,
            root_attributes,
        }
    }

    pub fn root_attributes(&self) -> &GroupAttributes {
        &self.root_attributes
    }

    /// Every endpoint reachable from this tree, with its protocol
    /// configuration — the listen set a transport adapter needs to bind
    /// before it can serve any request (§4.10). Accumulated the same way
    /// `GroupAttributes::apply` accumulates `endpoints`: later declarations
    /// win per key.
    pub fn all_endpoints(&self) -> HashMap<Endpoint, HttpConfig> {
        let mut endpoints = self.root_attributes.endpoints.clone();
        for (attrs, _) in &self.candidates {
            for (endpoint, config) in &attrs.endpoints {
                endpoints.insert(endpoint.clone(), config.clone());
            }
        }
        endpoints
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Resolve one request to exactly one response (or a host redirect), or
    /// the [`Incident`] that explains why none (or more than one)
    /// qualified (§4.7, §4.8).
    #[tracing::instrument(level = "debug", skip_all, fields(path = %ctx.path, method = ctx.method.as_str()))]
    pub fn resolve(&self, ctx: &RequestContext<'_>) -> Result<DispatchOutcome<'_>, Incident> {
        if let Some(host) = ctx.host {
            if let Some(primary) = redirect_target(&self.root_attributes, host) {
                return Ok(DispatchOutcome::RedirectHost(primary));
            }
        }

        let prefix_hits = self.trie.lookup_prefixes(ctx.path);

        let mut saw_non_method_candidate = false;
        let mut method_allowed = Vec::new();
        for (idx, remaining) in prefix_hits {
            let (attrs, _) = &self.candidates[idx];
            if !matcher::endpoint_matches(attrs, ctx.endpoint) {
                continue;
            }
            if !matcher::host_matches(attrs, ctx.host) {
                continue;
            }
            if !matcher::user_matches(attrs, ctx.user) {
                continue;
            }
            saw_non_method_candidate = true;
            if !matcher::method_matches(attrs, ctx.method) {
                continue;
            }
            method_allowed.push((idx, remaining));
        }

        if method_allowed.is_empty() {
            return Err(if saw_non_method_candidate {
                Incident::MethodNotAllowed
            } else {
                Incident::ResponseNotFound
            });
        }

        let mut matches = Vec::new();
        for (idx, remaining) in method_allowed {
            let (attrs, response) = &self.candidates[idx];
            if !response.accepts_subpath(&remaining) {
                continue;
            }
            if let QueryOutcome::Matched(query) = response.try_match_query(ctx.raw_query) {
                matches.push(MatchedCandidate {
                    response: response.as_ref(),
                    attributes: attrs,
                    query,
                    remaining_path: remaining,
                });
            }
        }

        match matches.len() {
            0 => Err(Incident::ResponseNotFound),
            1 => Ok(DispatchOutcome::Matched(matches.into_iter().next().unwrap())),
            ambiguous => {
                tracing::warn!(candidate_count = ambiguous, "request matched more than one response");
                Err(Incident::AmbiguousRequest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::group::{InnerGroup, RootGroup};
    use crate::response::{Input, ResponseBuilder, ResponseContent};

    fn index_for_scenario() -> (DispatchIndex, Endpoint) {
        let endpoint = Endpoint::new("0.0.0.0", 8080);
        let tree = RootGroup::new()
            .endpoint(endpoint.clone(), HttpConfig::http1())
            .child(
                InnerGroup::new().path("math").child(
                    InnerGroup::new().path("add").child(
                        ResponseBuilder::new()
                            .query(
                                crate::query::QueryItemGroup::new()
                                    .append(crate::query::required_parsed::<f64>("lhs"))
                                    .append(crate::query::required_parsed::<f64>("rhs"))
                                    .map(|(pair, rhs)| (pair.1, rhs)),
                            )
                            .content(|input: Input<(f64, f64), (), (), ()>| {
                                Ok(ResponseContent::new(
                                    200,
                                    (input.query.0 + input.query.1).to_string(),
                                ))
                            }),
                    ),
                ),
            )
            .child(
                InnerGroup::new()
                    .http_methods([Method::Get, Method::Put, Method::Delete])
                    .path("widgets")
                    .child(
                        InnerGroup::new().http_methods([Method::Delete]).child(
                            ResponseBuilder::new()
                                .content(|_: Input<(), (), (), ()>| Ok(ResponseContent::empty(204))),
                        ),
                    ),
            );
        (DispatchIndex::compile(tree.resolve()), endpoint)
    }

    #[test]
    fn resolves_a_unique_query_match() {
        let (index, endpoint) = index_for_scenario();
        let raw = RawQuery::parse("lhs=2&rhs=3");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::from_raw("math/add"),
            raw_query: &raw,
        };
        let outcome = index.resolve(&ctx).expect("should resolve");
        let DispatchOutcome::Matched(matched) = outcome else {
            panic!("expected a matched candidate, not a redirect");
        };
        assert_eq!(matched.remaining_path, Vec::<String>::new());
    }

    #[test]
    fn alias_host_redirects_to_the_primary_host() {
        let (index, endpoint) = index_for_scenario();
        let raw = RawQuery::parse("lhs=2&rhs=3");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: Some("example.org"),
            user: None,
            path: &Path::from_raw("math/add"),
            raw_query: &raw,
        };
        // This scenario's tree declares no hosts, so an arbitrary host is
        // never an alias and is served normally; host-redirect behavior is
        // covered directly against `redirect_target` below.
        assert!(index.resolve(&ctx).is_ok());

        let mut attrs = GroupAttributes::root();
        attrs.hosts.insert("example.com".to_string());
        attrs.host_aliases.insert("example.org".to_string());
        attrs.optional_subdomains.insert("www".to_string());
        assert_eq!(
            redirect_target(&attrs, "example.org"),
            Some("example.com".to_string())
        );
        assert_eq!(
            redirect_target(&attrs, "www.example.com"),
            Some("example.com".to_string())
        );
        assert_eq!(redirect_target(&attrs, "example.com"), None);
        assert_eq!(redirect_target(&attrs, "unrelated.net"), None);
    }

    #[test]
    fn method_filter_intersection_rejects_disallowed_verbs() {
        let (index, endpoint) = index_for_scenario();
        let raw = RawQuery::parse("");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::from_raw("widgets"),
            raw_query: &raw,
        };
        assert_eq!(index.resolve(&ctx).err(), Some(Incident::MethodNotAllowed));

        let ctx_delete = RequestContext {
            method: Method::Delete,
            ..ctx
        };
        assert!(index.resolve(&ctx_delete).is_ok());
    }

    #[test]
    fn missing_required_query_item_reports_response_not_found() {
        let (index, endpoint) = index_for_scenario();
        let raw = RawQuery::parse("lhs=2");
        let ctx = RequestContext {
            endpoint: &endpoint,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::from_raw("math/add"),
            raw_query: &raw,
        };
        assert_eq!(index.resolve(&ctx).err(), Some(Incident::ResponseNotFound));
    }

    #[test]
    fn unknown_endpoint_reports_response_not_found() {
        let (index, _) = index_for_scenario();
        let other = Endpoint::new("0.0.0.0", 9999);
        let raw = RawQuery::parse("lhs=1&rhs=1");
        let ctx = RequestContext {
            endpoint: &other,
            method: Method::Get,
            host: None,
            user: None,
            path: &Path::from_raw("math/add"),
            raw_query: &raw,
        };
        assert_eq!(index.resolve(&ctx).err(), Some(Incident::ResponseNotFound));
    }
}
