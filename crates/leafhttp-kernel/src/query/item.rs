//! Single query-item declarations (§4.2).

use std::fmt;
use std::sync::Arc;

/// Result of classifying one query item's raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<T> {
    Accepted(T),
    Rejected,
}

impl<T> Classification<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Classification::Accepted(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Classification<U> {
        match self {
            Classification::Accepted(v) => Classification::Accepted(f(v)),
            Classification::Rejected => Classification::Rejected,
        }
    }
}

/// A type that can be parsed from, and serialized back to, a query string
/// value without losing information for at least the values it round-trips.
///
/// Used by [`required`]'s generic form: `required::<T>(name)`.
pub trait LosslessFromString: Sized {
    fn from_str_lossless(s: &str) -> Option<Self>;
    fn to_string_lossless(&self) -> String;
}

macro_rules! impl_lossless_numeric {
    ($($t:ty),*) => {
        $(
            impl LosslessFromString for $t {
                fn from_str_lossless(s: &str) -> Option<Self> {
                    s.parse().ok()
                }
                fn to_string_lossless(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_lossless_numeric!(f32, f64, i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl LosslessFromString for String {
    fn from_str_lossless(s: &str) -> Option<Self> {
        Some(s.to_string())
    }
    fn to_string_lossless(&self) -> String {
        self.clone()
    }
}

/// A single declared query parameter.
///
/// `classify` carries the full required/optional/bool/void semantics: it is
/// called with `None` when the item's name is absent from the request
/// query, and with `Some(raw)` otherwise.
#[derive(Clone)]
pub struct QueryItem<T> {
    pub(crate) name: String,
    pub(crate) required: bool,
    classify: Arc<dyn Fn(Option<&str>) -> Classification<T> + Send + Sync>,
}

impl<T> fmt::Debug for QueryItem<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryItem")
            .field("name", &self.name)
            .field("required", &self.required)
            .finish()
    }
}

impl<T> QueryItem<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn classify(&self, raw: Option<&str>) -> Classification<T> {
        (self.classify)(raw)
    }
}

/// A required string item: absent → `Rejected`.
pub fn required(name: impl Into<String>) -> QueryItem<String> {
    QueryItem {
        name: name.into(),
        required: true,
        classify: Arc::new(|raw| match raw {
            Some(v) => Classification::Accepted(v.to_string()),
            None => Classification::Rejected,
        }),
    }
}

/// A required item parsed via a caller-supplied function. Parse failure or
/// absence both reject the item.
pub fn required_with<T: Send + Sync + 'static>(
    name: impl Into<String>,
    parse: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
) -> QueryItem<T> {
    QueryItem {
        name: name.into(),
        required: true,
        classify: Arc::new(move |raw| match raw {
            Some(v) => match parse(v) {
                Some(t) => Classification::Accepted(t),
                None => Classification::Rejected,
            },
            None => Classification::Rejected,
        }),
    }
}

/// A required item of any [`LosslessFromString`] type — the generic form
/// `required::<T>(name)` from §4.2.
pub fn required_parsed<T: LosslessFromString + Send + Sync + 'static>(
    name: impl Into<String>,
) -> QueryItem<T> {
    required_with(name, T::from_str_lossless)
}

/// An optional string item: absent → `Accepted(None)`.
pub fn optional(name: impl Into<String>) -> QueryItem<Option<String>> {
    QueryItem {
        name: name.into(),
        required: false,
        classify: Arc::new(|raw| Classification::Accepted(raw.map(str::to_string))),
    }
}

/// An optional item parsed via a caller-supplied function. Absent → `Accepted(None)`;
/// present-but-unparseable → `Rejected` (the candidate is ineligible, it is
/// not silently treated as absent — see §4.2 matching contract).
pub fn optional_with<T: Send + Sync + 'static>(
    name: impl Into<String>,
    parse: impl Fn(&str) -> Option<T> + Send + Sync + 'static,
) -> QueryItem<Option<T>> {
    QueryItem {
        name: name.into(),
        required: false,
        classify: Arc::new(move |raw| match raw {
            None => Classification::Accepted(None),
            Some(v) => match parse(v) {
                Some(t) => Classification::Accepted(Some(t)),
                None => Classification::Rejected,
            },
        }),
    }
}

/// An optional item of any [`LosslessFromString`] type.
pub fn optional_parsed<T: LosslessFromString + Send + Sync + 'static>(
    name: impl Into<String>,
) -> QueryItem<Option<T>> {
    optional_with(name, T::from_str_lossless)
}

/// A presence-as-flag boolean item. See the classification table in §4.2:
/// absence maps to `false`; a fixed set of truthy/falsy tokens (including
/// the empty string, which is truthy) map to `true`/`false`; anything else
/// rejects the candidate.
pub fn bool_item(name: impl Into<String>) -> QueryItem<bool> {
    QueryItem {
        name: name.into(),
        required: false,
        classify: Arc::new(|raw| match raw {
            None => Classification::Accepted(false),
            Some(v) => match v {
                "true" | "TRUE" | "True" | "yes" | "YES" | "Yes" | "1" | "" => {
                    Classification::Accepted(true)
                }
                "false" | "FALSE" | "False" | "no" | "NO" | "No" | "0" => {
                    Classification::Accepted(false)
                }
                _ => Classification::Rejected,
            },
        }),
    }
}

/// A void item: matches only when the name is entirely absent from the query.
pub fn void(name: impl Into<String>) -> QueryItem<()> {
    QueryItem {
        name: name.into(),
        required: false,
        classify: Arc::new(|raw| match raw {
            None => Classification::Accepted(()),
            Some(_) => Classification::Rejected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_absence() {
        let item = required("lhs");
        assert_eq!(item.classify(None), Classification::Rejected);
        assert_eq!(
            item.classify(Some("1.5")),
            Classification::Accepted("1.5".to_string())
        );
    }

    #[test]
    fn required_parsed_round_trips_f64() {
        let item = required_parsed::<f64>("lhs");
        for raw in ["1.5", "-2.0", "0", "42"] {
            let v: f64 = raw.parse().unwrap();
            assert_eq!(item.classify(Some(&v.to_string_lossless())), Classification::Accepted(v));
        }
        assert_eq!(item.classify(Some("not-a-number")), Classification::Rejected);
        assert_eq!(item.classify(None), Classification::Rejected);
    }

    #[test]
    fn optional_accepts_absence_as_none() {
        let item = optional_parsed::<i32>("to");
        assert_eq!(item.classify(None), Classification::Accepted(None));
        assert_eq!(item.classify(Some("10")), Classification::Accepted(Some(10)));
        assert_eq!(item.classify(Some("ten")), Classification::Rejected);
    }

    #[test]
    fn bool_item_classification_table() {
        let item = bool_item("flag");
        assert_eq!(item.classify(None), Classification::Accepted(false));
        for truthy in ["true", "TRUE", "True", "yes", "YES", "Yes", "1", ""] {
            assert_eq!(
                item.classify(Some(truthy)),
                Classification::Accepted(true),
                "expected {truthy:?} to be truthy"
            );
        }
        for falsy in ["false", "FALSE", "False", "no", "NO", "No", "0"] {
            assert_eq!(item.classify(Some(falsy)), Classification::Accepted(false));
        }
        assert_eq!(item.classify(Some("maybe")), Classification::Rejected);
    }

    #[test]
    fn void_item_matches_only_absence() {
        let item = void("debug");
        assert_eq!(item.classify(None), Classification::Accepted(()));
        assert_eq!(item.classify(Some("")), Classification::Rejected);
        assert_eq!(item.classify(Some("1")), Classification::Rejected);
    }
}
