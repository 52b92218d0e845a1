//! Exposition-format identification for scraped metrics responses.

/// Wire-level metrics exposition formats the bridge understands.
///
/// `ProtoText` is recognized when a collector asks for it but is never
/// produced for a merged response. `Unknown` covers everything the
/// classifier cannot place, including malformed headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpositionFormat {
    TextV0_0_4,
    OpenMetricsV0_0_1,
    OpenMetricsV1_0_0,
    ProtoDelimited,
    ProtoText,
    Unknown,
}

const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";
const CONTENT_TYPE_OPENMETRICS_0_0_1: &str =
    "application/openmetrics-text; version=0.0.1; charset=utf-8";
const CONTENT_TYPE_OPENMETRICS_1_0_0: &str =
    "application/openmetrics-text; version=1.0.0; charset=utf-8";
const CONTENT_TYPE_PROTO_DELIMITED: &str =
    "application/vnd.google.protobuf; proto=io.prometheus.client.MetricFamily; encoding=delimited";

const PROTO_METRIC_FAMILY: &str = "io.prometheus.client.metricfamily";

impl ExpositionFormat {
    /// Exact `Content-Type` value used on the wire, for the formats the
    /// bridge is willing to serve.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::TextV0_0_4 => Some(CONTENT_TYPE_TEXT),
            Self::OpenMetricsV0_0_1 => Some(CONTENT_TYPE_OPENMETRICS_0_0_1),
            Self::OpenMetricsV1_0_0 => Some(CONTENT_TYPE_OPENMETRICS_1_0_0),
            Self::ProtoDelimited => Some(CONTENT_TYPE_PROTO_DELIMITED),
            Self::ProtoText | Self::Unknown => None,
        }
    }

    /// Whether a merged response may be emitted in this format.
    pub fn is_servable(&self) -> bool {
        matches!(
            self,
            Self::TextV0_0_4
                | Self::OpenMetricsV0_0_1
                | Self::OpenMetricsV1_0_0
                | Self::ProtoDelimited
        )
    }

    /// Top-level media type, used when matching `type/*` Accept entries.
    pub(crate) fn main_type(&self) -> Option<&'static str> {
        match self {
            Self::TextV0_0_4 => Some("text"),
            Self::OpenMetricsV0_0_1 | Self::OpenMetricsV1_0_0 | Self::ProtoDelimited => {
                Some("application")
            }
            Self::ProtoText | Self::Unknown => None,
        }
    }

    /// Maps a backend's raw `Content-Type` header value onto a format.
    ///
    /// Total: anything unrecognized or malformed is `Unknown`, including the
    /// protobuf media type with `encoding=text`, which no merged response can
    /// be produced from.
    pub fn classify(content_type: &str) -> Self {
        let Some(media) = MediaType::parse(content_type) else {
            return Self::Unknown;
        };

        match (media.main.as_str(), media.sub.as_str()) {
            ("application", "vnd.google.protobuf") => {
                if media.param("proto") == Some(PROTO_METRIC_FAMILY)
                    && media.param("encoding") == Some("delimited")
                {
                    Self::ProtoDelimited
                } else {
                    Self::Unknown
                }
            }
            ("text", "plain") => match media.param("version") {
                None | Some("0.0.4") => Self::TextV0_0_4,
                Some(_) => Self::Unknown,
            },
            ("application", "openmetrics-text") => match media.param("version") {
                Some("1.0.0") => Self::OpenMetricsV1_0_0,
                Some("0.0.1") => Self::OpenMetricsV0_0_1,
                _ => Self::Unknown,
            },
            _ => Self::Unknown,
        }
    }
}

/// A parsed `type/subtype; key=value; ...` media type. Types, subtypes and
/// parameters are normalized to lowercase; parameter values lose any
/// surrounding quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MediaType {
    pub main: String,
    pub sub: String,
    params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        let mut segments = value.split(';');
        let essence = segments.next()?.trim();

        let (main, sub) = essence.split_once('/')?;
        let main = main.trim().to_ascii_lowercase();
        let sub = sub.trim().to_ascii_lowercase();
        if main.is_empty() || sub.is_empty() || main.contains(char::is_whitespace) {
            return None;
        }

        let mut params = Vec::new();
        for segment in segments {
            let Some((key, raw)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let raw = raw.trim().trim_matches('"');
            if !key.is_empty() {
                params.push((key, raw.to_ascii_lowercase()));
            }
        }

        Some(Self { main, sub, params })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
