//! Query-item groups: the heterogeneous-tuple combinator described in §4.2
//! and Design Note "Heterogeneous tuple growth of query groups".
//!
//! Rather than a fixed-arity `Query0..Query10` enum (source-language
//! artifact, per §9), items are folded into a nested-pair accumulator type
//! as they're appended — `QueryItemGroup<()>`, then `QueryItemGroup<((), A)>`,
//! then `QueryItemGroup<(((), A), B)>`, and so on. This lifts the ten-item
//! cap entirely while keeping the "every declared item matches, one value is
//! produced" contract, and `map`/`flat_map` collapse the accumulator to a
//! single user-facing type at any point.

use super::item::{Classification, QueryItem};
use super::raw::RawQuery;
use std::sync::Arc;

/// Outcome of matching a whole group against one request's query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupMatch<T> {
    Matched(T),
    NoMatch,
}

impl<T> GroupMatch<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> GroupMatch<U> {
        match self {
            GroupMatch::Matched(v) => GroupMatch::Matched(f(v)),
            GroupMatch::NoMatch => GroupMatch::NoMatch,
        }
    }
}

#[derive(Clone)]
struct ItemMeta {
    name: String,
    required: bool,
}

/// A declared, ordered collection of query items collapsing to value type `T`.
///
/// Two flavors, matching §4.2:
/// - *structured*: evaluates each declared item's `classify` against the
///   request's last-wins query map; schema-sufficient, not schema-exclusive.
/// - *raw*: opaque `(name, value)` pairs handed to a user transform; always
///   matches, and disables the dispatcher's single-pass optimization for the
///   whole candidate set it shares a dispatch key with (§4.7).
#[derive(Clone)]
pub enum QueryItemGroup<T> {
    Structured {
        items: Arc<Vec<ItemMeta>>,
        #[allow(clippy::type_complexity)]
        matcher: Arc<dyn Fn(&RawQuery) -> GroupMatch<T> + Send + Sync>,
    },
    Raw {
        #[allow(clippy::type_complexity)]
        transform: Arc<dyn Fn(&[(String, String)]) -> GroupMatch<T> + Send + Sync>,
    },
}

impl<T> QueryItemGroup<T> {
    pub fn is_raw(&self) -> bool {
        matches!(self, QueryItemGroup::Raw { .. })
    }

    pub fn declared_names(&self) -> Vec<&str> {
        match self {
            QueryItemGroup::Structured { items, .. } => {
                items.iter().map(|m| m.name.as_str()).collect()
            }
            QueryItemGroup::Raw { .. } => Vec::new(),
        }
    }

    /// Run this group against one request's parsed query.
    pub fn try_match(&self, raw: &RawQuery) -> GroupMatch<T> {
        match self {
            QueryItemGroup::Structured { matcher, .. } => matcher(raw),
            QueryItemGroup::Raw { transform } => transform(raw.pairs()),
        }
    }

    /// Collapse the accumulated value to `U`. Valid in either mode.
    pub fn map<U: 'static>(self, f: impl Fn(T) -> U + Send + Sync + 'static) -> QueryItemGroup<U>
    where
        T: 'static,
    {
        match self {
            QueryItemGroup::Structured { items, matcher } => QueryItemGroup::Structured {
                items,
                matcher: Arc::new(move |raw| matcher(raw).map(&f)),
            },
            QueryItemGroup::Raw { transform } => QueryItemGroup::Raw {
                transform: Arc::new(move |pairs| transform(pairs).map(&f)),
            },
        }
    }

    /// Collapse the accumulated value to `U`, allowing rejection.
    pub fn flat_map<U: 'static>(
        self,
        f: impl Fn(T) -> Classification<U> + Send + Sync + 'static,
    ) -> QueryItemGroup<U>
    where
        T: 'static,
    {
        let apply = move |m: GroupMatch<T>| match m {
            GroupMatch::Matched(v) => match f(v) {
                Classification::Accepted(u) => GroupMatch::Matched(u),
                Classification::Rejected => GroupMatch::NoMatch,
            },
            GroupMatch::NoMatch => GroupMatch::NoMatch,
        };
        match self {
            QueryItemGroup::Structured { items, matcher } => QueryItemGroup::Structured {
                items,
                matcher: Arc::new(move |raw| apply(matcher(raw))),
            },
            QueryItemGroup::Raw { transform } => QueryItemGroup::Raw {
                transform: Arc::new(move |pairs| apply(transform(pairs))),
            },
        }
    }
}

impl QueryItemGroup<()> {
    /// An empty structured group: matches any query, produces `()`.
    pub fn new() -> Self {
        QueryItemGroup::Structured {
            items: Arc::new(Vec::new()),
            matcher: Arc::new(|_raw| GroupMatch::Matched(())),
        }
    }
}

impl Default for QueryItemGroup<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> QueryItemGroup<T> {
    /// Append a structured item, growing the accumulator to `(T, U)`.
    ///
    /// Rejected if this group has already switched to raw mode (schema and
    /// raw transforms are mutually exclusive on one response — §4.4).
    pub fn append<U: Send + Sync + Clone + 'static>(
        self,
        item: QueryItem<U>,
    ) -> QueryItemGroup<(T, U)> {
        match self {
            QueryItemGroup::Structured { items, matcher } => {
                let mut next_items = (*items).clone();
                next_items.push(ItemMeta {
                    name: item.name().to_string(),
                    required: item.is_required(),
                });
                let item = Arc::new(item);
                QueryItemGroup::Structured {
                    items: Arc::new(next_items),
                    matcher: Arc::new(move |raw| {
                        let prior = match matcher(raw) {
                            GroupMatch::Matched(v) => v,
                            GroupMatch::NoMatch => return GroupMatch::NoMatch,
                        };
                        match item.classify(raw.get_last(item.name())) {
                            Classification::Accepted(u) => GroupMatch::Matched((prior, u)),
                            Classification::Rejected => GroupMatch::NoMatch,
                        }
                    }),
                }
            }
            QueryItemGroup::Raw { .. } => {
                panic!(
                    "cannot append a structured query item to a group already using a raw-mode transform"
                );
            }
        }
    }
}

/// Construct a raw-mode group: the user's transform sees the full ordered
/// `(name, value)` list and always "matches" the query (it may still reject
/// via `raw_flat_map`).
pub fn raw_map<T: 'static>(
    f: impl Fn(&[(String, String)]) -> T + Send + Sync + 'static,
) -> QueryItemGroup<T> {
    QueryItemGroup::Raw {
        transform: Arc::new(move |pairs| GroupMatch::Matched(f(pairs))),
    }
}

/// Construct a raw-mode group that may reject based on the query contents.
pub fn raw_flat_map<T: 'static>(
    f: impl Fn(&[(String, String)]) -> Classification<T> + Send + Sync + 'static,
) -> QueryItemGroup<T> {
    QueryItemGroup::Raw {
        transform: Arc::new(move |pairs| match f(pairs) {
            Classification::Accepted(t) => GroupMatch::Matched(t),
            Classification::Rejected => GroupMatch::NoMatch,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::super::item::{optional_parsed, required_parsed};
    use super::*;

    #[test]
    fn empty_group_matches_any_query() {
        let group = QueryItemGroup::new();
        assert_eq!(
            group.try_match(&RawQuery::parse("anything=goes")),
            GroupMatch::Matched(())
        );
    }

    #[test]
    fn append_grows_nested_tuple_and_enforces_required() {
        let group = QueryItemGroup::new()
            .append(required_parsed::<f64>("lhs"))
            .append(required_parsed::<f64>("rhs"));

        // the nested shape is (((), f64), f64)
        assert_eq!(
            group.try_match(&RawQuery::parse("lhs=1.5&rhs=2.5")),
            GroupMatch::Matched((((), 1.5_f64), 2.5_f64))
        );
        assert_eq!(group.try_match(&RawQuery::parse("lhs=1.5")), GroupMatch::NoMatch);
    }

    #[test]
    fn map_collapses_nested_tuple_to_flat_value() {
        let group = QueryItemGroup::new()
            .append(required_parsed::<f64>("lhs"))
            .append(required_parsed::<f64>("rhs"))
            .map(|(lhs_pair, rhs)| (lhs_pair.1, rhs));
        assert_eq!(
            group.try_match(&RawQuery::parse("lhs=1.5&rhs=2.5")),
            GroupMatch::Matched((1.5, 2.5))
        );
    }

    #[test]
    fn flat_map_can_reject() {
        let group = QueryItemGroup::new()
            .append(required_parsed::<i32>("from"))
            .append(optional_parsed::<i32>("to"))
            .flat_map(|(pair, to)| match to {
                Some(to) if to >= pair.1 => Classification::Accepted((pair.1, to)),
                _ => Classification::Rejected,
            });
        assert_eq!(
            group.try_match(&RawQuery::parse("from=1&to=10")),
            GroupMatch::Matched((1, 10))
        );
        assert_eq!(group.try_match(&RawQuery::parse("from=10&to=1")), GroupMatch::NoMatch);
    }

    #[test]
    fn raw_mode_always_matches_and_disables_schema() {
        let group = raw_map(|pairs: &[(String, String)]| pairs.len());
        assert!(group.is_raw());
        assert_eq!(
            group.try_match(&RawQuery::parse("a=1&b=2&c=3")),
            GroupMatch::Matched(3)
        );
    }

    #[test]
    fn append_after_raw_mode_panics() {
        let group: QueryItemGroup<usize> = raw_map(|p| p.len());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            group.append(required_parsed::<f64>("x"))
        }));
        assert!(result.is_err());
    }
}
