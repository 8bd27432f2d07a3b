//! The declarative tree of response declarations (§3, §4.5) and its
//! resolution into a flat list of `(attributes, response)` pairs ready for
//! dispatch-index compilation.

use crate::cascade::{GroupAttributes, GroupDecl};
use crate::config::{Endpoint, HttpConfig, Method};
use crate::incident::Incident;
use crate::path::Path;
use crate::response::{DynResponse, ErrorCallback, IncidentHandler, ResponseImpl};
use std::collections::HashSet;

/// One node's children: a nested group, a leaf response, a conditional
/// inclusion, or a statically enumerated family of children (§3's
/// `Child` variants, used for build-time conditional/enumerated trees —
/// e.g. including a debug-only endpoint, or declaring one child per
/// configured backend).
pub enum Child {
    Group(InnerGroup),
    Response(Box<dyn DynResponse>),
    If {
        condition: bool,
        then_branch: Box<Child>,
    },
    ForEach(Vec<Child>),
}

impl<Q, H, B, S> From<ResponseImpl<Q, H, B, S>> for Child
where
    Q: Send + Sync + 'static,
    H: Send + Sync + 'static,
    B: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    fn from(response: ResponseImpl<Q, H, B, S>) -> Self {
        Child::Response(Box::new(response))
    }
}

/// Include `then_branch` only when `condition` holds, decided once at
/// tree-construction time — not re-evaluated per request.
pub fn if_then(condition: bool, then_branch: impl Into<Child>) -> Child {
    Child::If {
        condition,
        then_branch: Box::new(then_branch.into()),
    }
}

/// Expand one [`Child`] per item of `items`, all siblings under the parent
/// that declares this.
pub fn for_each<T>(items: impl IntoIterator<Item = T>, f: impl Fn(T) -> Child) -> Child {
    Child::ForEach(items.into_iter().map(f).collect())
}

macro_rules! decl_builders {
    () => {
        /// Add a listen endpoint (accumulates with ancestors by key — §3).
        pub fn endpoint(mut self, endpoint: Endpoint, config: HttpConfig) -> Self {
            self.decl.endpoints.insert(endpoint, config);
            self
        }

        pub fn host(mut self, host: impl Into<String>) -> Self {
            self.decl.hosts.insert(host.into());
            self
        }

        pub fn host_alias(mut self, alias: impl Into<String>) -> Self {
            self.decl.host_aliases.insert(alias.into());
            self
        }

        pub fn optional_subdomain(mut self, subdomain: impl Into<String>) -> Self {
            self.decl.optional_subdomains.insert(subdomain.into());
            self
        }

        /// Narrow the method filter at this node (overlay/intersection on
        /// descent — §3).
        pub fn http_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
            self.decl.http_methods = Some(methods.into_iter().collect());
            self
        }

        pub fn users(mut self, users: impl IntoIterator<Item = String>) -> Self {
            self.decl.users = Some(users.into_iter().collect::<HashSet<_>>());
            self
        }

        pub fn path(mut self, segment: impl AsRef<str>) -> Self {
            self.decl.path_segment = Path::from_raw(segment.as_ref());
            self
        }

        pub fn body_length_limit(mut self, limit: u64) -> Self {
            self.decl.body_length_limit = Some(limit);
            self
        }

        pub fn on_incident(mut self, handler: IncidentHandler) -> Self {
            self.decl.incident_handler = Some(handler);
            self
        }

        pub fn on_error(mut self, callback: ErrorCallback) -> Self {
            self.decl.error_callback = Some(callback);
            self
        }

        pub fn child(mut self, child: impl Into<Child>) -> Self {
            self.children.push(child.into());
            self
        }
    };
}

/// The top of a declaration tree: the only place a fresh [`GroupAttributes`]
/// starts from the universal defaults (§3).
#[derive(Default)]
pub struct RootGroup {
    decl: GroupDecl,
    children: Vec<Child>,
}

impl RootGroup {
    pub fn new() -> Self {
        Self::default()
    }

    decl_builders!();

    /// Flatten the tree into the list the dispatch-index compiler consumes
    /// (§4.5, §4.7): the root's own attributes (used as the fallback
    /// incident/error chain when dispatch fails before any candidate is
    /// chosen), plus one entry per reachable leaf response, each carrying
    /// the attributes cascaded down to it.
    pub fn resolve(self) -> (GroupAttributes, Vec<(GroupAttributes, Box<dyn DynResponse>)>) {
        let attrs = GroupAttributes::root().apply(&self.decl);
        let mut out = Vec::new();
        resolve_children(attrs.clone(), self.children, &mut out);
        (attrs, out)
    }
}

impl From<InnerGroup> for Child {
    fn from(group: InnerGroup) -> Self {
        Child::Group(group)
    }
}

/// A nested group: narrows or extends the ancestor attributes it's placed
/// under (§3).
#[derive(Default)]
pub struct InnerGroup {
    decl: GroupDecl,
    children: Vec<Child>,
}

impl InnerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    decl_builders!();
}

fn resolve_children(
    attrs: GroupAttributes,
    children: Vec<Child>,
    out: &mut Vec<(GroupAttributes, Box<dyn DynResponse>)>,
) {
    for child in children {
        match child {
            Child::Group(inner) => {
                let child_attrs = attrs.apply(&inner.decl);
                resolve_children(child_attrs, inner.children, out);
            }
            Child::Response(response) => out.push((attrs.clone(), response)),
            Child::If {
                condition,
                then_branch,
            } => {
                if condition {
                    resolve_children(attrs.clone(), vec![*then_branch], out);
                }
            }
            Child::ForEach(items) => {
                resolve_children(attrs.clone(), items, out);
            }
        }
    }
}

/// Raised while resolving a tree whose declarations can't be reconciled
/// into a valid [`GroupAttributes`] (reserved for future structural
/// validation — currently `resolve` never fails, since cascade operations
/// are total; kept as a distinct type so callers don't need to change
/// signature if a validating pass is added later).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid response tree: {0}")]
pub struct TreeError(pub String);

impl From<Incident> for TreeError {
    fn from(incident: Incident) -> Self {
        TreeError(incident.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::response::{ResponseBuilder, ResponseContent};

    fn leaf(status: u16) -> Child {
        ResponseBuilder::new()
            .content(move |_: crate::response::Input<(), (), (), ()>| {
                Ok(ResponseContent::empty(status))
            })
            .into()
    }

    #[test]
    fn resolve_cascades_attributes_down_to_each_leaf() {
        let tree = RootGroup::new()
            .endpoint(Endpoint::new("0.0.0.0", 8080), HttpConfig::http1())
            .host("example.com")
            .http_methods([Method::Get, Method::Put, Method::Delete])
            .child(
                InnerGroup::new()
                    .path("admin")
                    .http_methods([Method::Delete])
                    .child(leaf(204)),
            )
            .child(leaf(200));

        let (_, resolved) = tree.resolve();
        assert_eq!(resolved.len(), 2);

        let admin = resolved
            .iter()
            .find(|(attrs, _)| attrs.path == Path::from_raw("admin"))
            .expect("admin leaf present");
        assert_eq!(
            admin.0.http_methods,
            Some([Method::Delete].into_iter().collect())
        );
        assert!(admin.0.hosts.contains("example.com"));

        let root_leaf = resolved
            .iter()
            .find(|(attrs, _)| attrs.path == Path::root())
            .expect("root leaf present");
        assert_eq!(
            root_leaf.0.http_methods,
            Some([Method::Get, Method::Put, Method::Delete].into_iter().collect())
        );
    }

    #[test]
    fn if_then_excludes_branch_when_condition_is_false() {
        let tree = RootGroup::new()
            .child(if_then(false, leaf(200)))
            .child(if_then(true, leaf(201)));
        let (_, resolved) = tree.resolve();
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn for_each_expands_one_child_per_item() {
        let tree = RootGroup::new().child(for_each(["a", "b", "c"], |name| {
            InnerGroup::new().path(name).child(leaf(200)).into()
        }));
        let (_, resolved) = tree.resolve();
        assert_eq!(resolved.len(), 3);
    }
}
