//! The parsed URL query: an ordered list of `(name, value)` pairs plus a
//! last-wins lookup map, built once per request (§4.7).

use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// The decoded query string of one request.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pairs: Vec<(String, String)>,
    last_wins: HashMap<String, String>,
}

impl RawQuery {
    /// Parse a raw query string (without the leading `?`). Percent-decodes
    /// names and values; `+` is left untouched (not treated as a space —
    /// query items see the decoded value only for percent-escapes).
    pub fn parse(query: &str) -> Self {
        let mut pairs = Vec::new();
        let mut last_wins = HashMap::new();
        if query.is_empty() {
            return Self { pairs, last_wins };
        }
        for segment in query.split('&') {
            if segment.is_empty() {
                continue;
            }
            let (raw_name, raw_value) = match segment.split_once('=') {
                Some((n, v)) => (n, v),
                None => (segment, ""),
            };
            let name = percent_decode_str(raw_name).decode_utf8_lossy().into_owned();
            let value = percent_decode_str(raw_value).decode_utf8_lossy().into_owned();
            last_wins.insert(name.clone(), value.clone());
            pairs.push((name, value));
        }
        Self { pairs, last_wins }
    }

    /// The last value bound to `name`, if present ("last-wins", §4.7).
    pub fn get_last(&self, name: &str) -> Option<&str> {
        self.last_wins.get(name).map(String::as_str)
    }

    /// The full ordered pair list, including duplicates, as received.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
