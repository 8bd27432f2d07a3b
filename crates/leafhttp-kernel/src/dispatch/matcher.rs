//! The coarse-dimension filters applied before a path-trie candidate's
//! query is even considered (§4.7): endpoint, host, user, method. Each is
//! a pure predicate over one cascaded [`GroupAttributes`], kept separate
//! from the trie itself so the trie only has to solve the expensive
//! dimension (path).

use crate::cascade::GroupAttributes;
use crate::config::{Endpoint, Method};

pub fn endpoint_matches(attrs: &GroupAttributes, endpoint: &Endpoint) -> bool {
    attrs.endpoints.is_empty() || attrs.endpoints.contains_key(endpoint)
}

pub fn host_matches(attrs: &GroupAttributes, host: Option<&str>) -> bool {
    if attrs.hosts.is_empty() && attrs.host_aliases.is_empty() {
        return true;
    }
    let Some(host) = host else {
        return false;
    };
    if attrs.hosts.contains(host) || attrs.host_aliases.contains(host) {
        return true;
    }
    attrs.hosts.iter().any(|base| {
        attrs
            .optional_subdomains
            .iter()
            .any(|sub| host == format!("{sub}.{base}"))
    })
}

pub fn user_matches(attrs: &GroupAttributes, user: Option<&str>) -> bool {
    match &attrs.users {
        None => true,
        Some(allowed) => user.map(|u| allowed.contains(u)).unwrap_or(false),
    }
}

pub fn method_matches(attrs: &GroupAttributes, method: Method) -> bool {
    match &attrs.http_methods {
        None => true,
        Some(allowed) => allowed.contains(&method),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::GroupAttributes;
    use crate::config::HttpConfig;

    #[test]
    fn host_matches_an_optional_subdomain_with_or_without_the_prefix() {
        let mut attrs = GroupAttributes::root();
        attrs.hosts.insert("example.com".to_string());
        attrs.optional_subdomains.insert("api".to_string());

        assert!(host_matches(&attrs, Some("example.com")));
        assert!(host_matches(&attrs, Some("api.example.com")));
        assert!(!host_matches(&attrs, Some("evil.com")));
    }

    #[test]
    fn no_declared_hosts_means_any_host_including_none() {
        let attrs = GroupAttributes::root();
        assert!(host_matches(&attrs, None));
        assert!(host_matches(&attrs, Some("anything")));
    }

    #[test]
    fn endpoint_filter_is_universal_when_empty() {
        let attrs = GroupAttributes::root();
        assert!(endpoint_matches(&attrs, &Endpoint::new("0.0.0.0", 80)));

        let mut scoped = GroupAttributes::root();
        scoped
            .endpoints
            .insert(Endpoint::new("0.0.0.0", 80), HttpConfig::http1());
        assert!(endpoint_matches(&scoped, &Endpoint::new("0.0.0.0", 80)));
        assert!(!endpoint_matches(&scoped, &Endpoint::new("0.0.0.0", 443)));
    }
}
