//! Rewriting of an inbound scrape URL into a backend-targeted URL.

use std::collections::BTreeMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Query-encoding set: everything outside the unreserved characters, so that
/// e.g. `*` serializes as `%2A` and the output is byte-stable.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// How the inbound query string is carried over to a backend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryModifier {
    /// Keep every inbound parameter and force `format=prometheus` plus
    /// `text_readouts=`, the shape a proxy admin endpoint expects.
    AddPrometheusFormat,
    /// Drop the inbound query entirely.
    RemoveQueryParameters,
}

type QueryMap = BTreeMap<String, Vec<String>>;

impl QueryModifier {
    fn apply(self, mut query: QueryMap) -> QueryMap {
        match self {
            Self::AddPrometheusFormat => {
                query.insert("format".to_string(), vec!["prometheus".to_string()]);
                query.insert("text_readouts".to_string(), vec![String::new()]);
                query
            }
            Self::RemoveQueryParameters => QueryMap::new(),
        }
    }
}

/// Builds the URL for one backend scrape from the URL the collector called.
///
/// Scheme, host, port and path are replaced wholesale; only the query
/// survives, transformed by `modifier`. Serialization is deterministic: keys
/// and per-key values in sorted order, percent-encoded, so the same input
/// always yields the same bytes.
pub fn rewrite_metrics_url(
    address: &str,
    port: u16,
    path: &str,
    modifier: QueryModifier,
    original: &Url,
) -> String {
    let query = serialize_query(&modifier.apply(query_map(original)));
    if query.is_empty() {
        format!("http://{address}:{port}{path}")
    } else {
        format!("http://{address}:{port}{path}?{query}")
    }
}

fn query_map(url: &Url) -> QueryMap {
    let mut map = QueryMap::new();
    for (key, value) in url.query_pairs() {
        map.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    map
}

fn serialize_query(query: &QueryMap) -> String {
    let mut pairs = Vec::new();
    for (key, values) in query {
        let mut values: Vec<&String> = values.iter().collect();
        values.sort();
        let encoded_key = utf8_percent_encode(key, QUERY_ENCODE).to_string();
        for value in values {
            pairs.push(format!(
                "{encoded_key}={}",
                utf8_percent_encode(value, QUERY_ENCODE)
            ));
        }
    }
    pairs.join("&")
}
