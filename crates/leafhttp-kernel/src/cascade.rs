//! The attribute cascade: the algebra that merges nested group attributes
//! during tree resolution (§3 `GroupAttributes`, §4.5, design note
//! "Attribute cascade as types").
//!
//! Rather than deep trait hierarchies, each field gets exactly one named
//! merge operation. [`GroupAttributes::apply`] is what tree resolution
//! (§4.5) actually calls at every node — it combines an ancestor's already-
//! resolved attributes with one descendant [`GroupDecl`] using *overlay*
//! semantics (narrowing for methods/users, accumulation for hosts/
//! endpoints, override for scalars). The standalone `accumulate_*`
//! functions below implement the widening alternative named in §3's
//! per-field table; they are not called by `apply` (ordinary nesting always
//! narrows — see DESIGN.md's Open Question decision) but are exposed for
//! composition helpers that explicitly want sibling-widening, and are
//! exercised directly by the §8 "Overlay vs accumulate" property tests.

use crate::config::{Endpoint, HttpConfig, Method};
use crate::path::Path;
use crate::response::{ErrorCallback, IncidentHandler};
use std::collections::{HashMap, HashSet};

/// What one group node declares on its own — always a delta relative to
/// its parent, never the fully resolved state.
#[derive(Clone, Default)]
pub struct GroupDecl {
    pub endpoints: HashMap<Endpoint, HttpConfig>,
    pub hosts: HashSet<String>,
    pub host_aliases: HashSet<String>,
    pub optional_subdomains: HashSet<String>,
    pub http_methods: Option<HashSet<Method>>,
    pub users: Option<HashSet<String>>,
    pub path_segment: Path,
    pub body_length_limit: Option<u64>,
    /// This node's own handler, if any — not cumulative; [`GroupAttributes`]
    /// builds the full chain by appending these as the tree descends.
    pub incident_handler: Option<IncidentHandler>,
    pub error_callback: Option<ErrorCallback>,
}

/// The cascaded state accumulated along one tree branch (§3).
///
/// `incident_handlers` / `error_callbacks` are ordered outermost-first
/// (root's handler, if any, comes first); a response's own handler is the
/// innermost link, appended on top of this chain at invocation time.
/// Walking `.iter().rev()` tries innermost first, matching §7's "falls
/// through to the next ancestor" behavior — a plain override here would
/// lose that fallthrough entirely.
#[derive(Clone, Default)]
pub struct GroupAttributes {
    pub endpoints: HashMap<Endpoint, HttpConfig>,
    pub hosts: HashSet<String>,
    pub host_aliases: HashSet<String>,
    pub optional_subdomains: HashSet<String>,
    pub http_methods: Option<HashSet<Method>>,
    pub users: Option<HashSet<String>>,
    pub path: Path,
    pub body_length_limit: Option<u64>,
    pub incident_handlers: Vec<IncidentHandler>,
    pub error_callbacks: Vec<ErrorCallback>,
}

impl GroupAttributes {
    pub fn root() -> Self {
        Self::default()
    }

    /// Combine `self` (the ancestor chain so far) with one node's own
    /// declaration, producing the attributes visible to that node's
    /// children. This is the operation §4.5 calls "overlay semantics".
    pub fn apply(&self, decl: &GroupDecl) -> GroupAttributes {
        GroupAttributes {
            endpoints: accumulate_endpoints(&self.endpoints, &decl.endpoints),
            hosts: union(&self.hosts, &decl.hosts),
            host_aliases: union(&self.host_aliases, &decl.host_aliases),
            optional_subdomains: union(&self.optional_subdomains, &decl.optional_subdomains),
            http_methods: overlay_narrow(&self.http_methods, &decl.http_methods),
            users: overlay_narrow(&self.users, &decl.users),
            path: Path::concat(&self.path, &decl.path_segment),
            body_length_limit: decl.body_length_limit.or(self.body_length_limit),
            incident_handlers: append_if_some(&self.incident_handlers, &decl.incident_handler),
            error_callbacks: append_if_some(&self.error_callbacks, &decl.error_callback),
        }
    }
}

fn append_if_some<T: Clone>(chain: &[T], new_link: &Option<T>) -> Vec<T> {
    let mut next = chain.to_vec();
    if let Some(link) = new_link {
        next.push(link.clone());
    }
    next
}

/// Set union — the only cascade mode for `hosts` / `host_aliases` /
/// `optional_subdomains` (§3).
pub fn union(parent: &HashSet<String>, child: &HashSet<String>) -> HashSet<String> {
    parent.union(child).cloned().collect()
}

/// Overlay (narrowing) combination for an optional filter set where `None`
/// means "any": if either side is the universal set, the other side wins
/// unchanged; otherwise the two sets intersect. Descendants can only
/// narrow (§3, confirmed by the method-filter-intersection scenario, §8).
pub fn overlay_narrow<T: Clone + Eq + std::hash::Hash>(
    parent: &Option<HashSet<T>>,
    child: &Option<HashSet<T>>,
) -> Option<HashSet<T>> {
    match (parent, child) {
        (None, None) => None,
        (None, Some(c)) => Some(c.clone()),
        (Some(p), None) => Some(p.clone()),
        (Some(p), Some(c)) => Some(p.intersection(c).cloned().collect()),
    }
}

/// Accumulate (widening) combination for the same kind of optional filter
/// set: `None` absorbs (stays universal), otherwise the two sets union.
/// Named in §3's per-field table as the alternative to [`overlay_narrow`];
/// see the module doc for why tree resolution does not call this.
pub fn accumulate_widen<T: Clone + Eq + std::hash::Hash>(
    parent: &Option<HashSet<T>>,
    child: &Option<HashSet<T>>,
) -> Option<HashSet<T>> {
    match (parent, child) {
        (None, _) | (_, None) => None,
        (Some(p), Some(c)) => Some(p.union(c).cloned().collect()),
    }
}

/// Merge endpoint maps by key, child wins per key — the accumulate mode
/// for `endpoints` (§3). Ordinary nesting uses this directly: multiple
/// groups contribute listen endpoints additively.
pub fn accumulate_endpoints(
    parent: &HashMap<Endpoint, HttpConfig>,
    child: &HashMap<Endpoint, HttpConfig>,
) -> HashMap<Endpoint, HttpConfig> {
    let mut merged = parent.clone();
    for (k, v) in child {
        merged.insert(k.clone(), v.clone());
    }
    merged
}

/// Overlay mode for `endpoints`: keep the ancestor's value if it is
/// non-empty, otherwise adopt the child's — "prevents accidental
/// override" (§3). Provided for parity with the per-field table; ordinary
/// nesting uses [`accumulate_endpoints`] (see module doc).
pub fn overlay_endpoints(
    parent: &HashMap<Endpoint, HttpConfig>,
    child: &HashMap<Endpoint, HttpConfig>,
) -> HashMap<Endpoint, HttpConfig> {
    if parent.is_empty() {
        child.clone()
    } else {
        parent.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn method_filter_descends_only_by_intersection() {
        let outer = Some(set(&["GET", "PUT", "DELETE"]));
        let inner = Some(set(&["DELETE"]));
        assert_eq!(overlay_narrow(&outer, &inner), Some(set(&["DELETE"])));
        // an absent child filter never widens the ancestor's
        assert_eq!(overlay_narrow(&outer, &None), outer);
        // an absent ancestor filter (universal) adopts the child's
        assert_eq!(overlay_narrow(&None, &inner), inner);
    }

    #[test]
    fn hosts_descend_only_by_union() {
        let parent = set(&["example.com"]);
        let child = set(&["api.example.com"]);
        assert_eq!(union(&parent, &child), set(&["example.com", "api.example.com"]));
    }

    #[test]
    fn path_descends_only_by_suffix_append() {
        let attrs = GroupAttributes {
            path: Path::from_raw("math"),
            ..GroupAttributes::root()
        };
        let decl = GroupDecl {
            path_segment: Path::from_raw("add"),
            ..GroupDecl::default()
        };
        assert_eq!(attrs.apply(&decl).path, Path::from_raw("math/add"));
    }

    #[test]
    fn body_length_limit_child_overrides_parent() {
        let attrs = GroupAttributes {
            body_length_limit: Some(100),
            ..GroupAttributes::root()
        };
        let overriding = GroupDecl {
            body_length_limit: Some(50),
            ..GroupDecl::default()
        };
        assert_eq!(attrs.apply(&overriding).body_length_limit, Some(50));

        let non_overriding = GroupDecl::default();
        assert_eq!(attrs.apply(&non_overriding).body_length_limit, Some(100));
    }

    #[test]
    fn accumulate_widen_is_available_as_the_named_alternative() {
        let outer = Some(set(&["GET"]));
        let inner = Some(set(&["DELETE"]));
        assert_eq!(accumulate_widen(&outer, &inner), Some(set(&["GET", "DELETE"])));
    }

    #[test]
    fn endpoints_accumulate_by_key_child_wins() {
        use crate::config::HttpConfig;
        let mut parent = HashMap::new();
        parent.insert(Endpoint::new("0.0.0.0", 80), HttpConfig::http1());
        let mut child = HashMap::new();
        child.insert(Endpoint::new("0.0.0.0", 443), HttpConfig::h2());
        let merged = accumulate_endpoints(&parent, &child);
        assert_eq!(merged.len(), 2);
    }
}
