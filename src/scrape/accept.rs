//! Collector `Accept` header parsing.
//!
//! Parses the header into an ordered preference list using the usual
//! content-negotiation precedence: fully specific media types first, then
//! `type/*`, then `*/*`; explicit `q` weights break ties within a
//! specificity tier, and original appearance order breaks the rest, so the
//! ordering is deterministic for any input.

use super::format::{ExpositionFormat, MediaType};

const DEFAULT_QUALITY: u16 = 1000;

/// What a single media range in the header can resolve to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeTarget {
    /// A specific media type that corresponds to a known exposition format.
    Format(ExpositionFormat),
    /// `type/*` for the given top-level type.
    AnySubtype(String),
    /// `*/*`.
    Any,
    /// A specific media type the bridge cannot produce (e.g. `application/json`).
    Unsupported,
}

/// One parsed media range, ranked for negotiation.
#[derive(Debug, Clone)]
pub struct MediaRange {
    pub target: RangeTarget,
    /// Quality weight in thousandths, `q=0.75` stored as 750.
    pub quality: u16,
    specificity: u8,
    position: usize,
}

/// The collector's stated format preferences, highest priority first.
#[derive(Debug, Clone)]
pub struct AcceptPreference {
    entries: Vec<MediaRange>,
}

impl AcceptPreference {
    /// Parses an `Accept` header value. An absent, empty, or entirely
    /// unparsable header degrades to accept-anything (`*/*` at default
    /// weight); individual malformed ranges are skipped.
    pub fn parse(header: Option<&str>) -> Self {
        let mut entries = Vec::new();

        for (position, range) in header
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .enumerate()
        {
            if let Some(entry) = parse_range(range, position) {
                entries.push(entry);
            }
        }

        if entries.is_empty() {
            entries.push(MediaRange {
                target: RangeTarget::Any,
                quality: DEFAULT_QUALITY,
                specificity: 0,
                position: 0,
            });
        }

        entries.sort_by(|a, b| {
            b.specificity
                .cmp(&a.specificity)
                .then(b.quality.cmp(&a.quality))
                .then(a.position.cmp(&b.position))
        });

        Self { entries }
    }

    pub fn entries(&self) -> &[MediaRange] {
        &self.entries
    }
}

fn parse_range(range: &str, position: usize) -> Option<MediaRange> {
    let media = MediaType::parse(range)?;

    let quality = match media.param("q") {
        Some(raw) => parse_quality(raw)?,
        None => DEFAULT_QUALITY,
    };
    // q=0 is an explicit "never send this"; the range carries no preference.
    if quality == 0 {
        return None;
    }

    let (target, specificity) = match (media.main.as_str(), media.sub.as_str()) {
        ("*", "*") => (RangeTarget::Any, 0),
        (main, "*") => (RangeTarget::AnySubtype(main.to_string()), 1),
        _ => (classify_specific(&media), 2),
    };

    Some(MediaRange {
        target,
        quality,
        specificity,
        position,
    })
}

/// Maps a fully specific media range onto the format the collector is asking
/// for. Slightly more permissive than response classification: a version-less
/// `application/openmetrics-text` request means the stable 0.0.1 flavor, and
/// the text-encoded protobuf type is recognized (though never served).
fn classify_specific(media: &MediaType) -> RangeTarget {
    match (media.main.as_str(), media.sub.as_str()) {
        ("application", "vnd.google.protobuf") => {
            if media.param("proto") != Some("io.prometheus.client.metricfamily") {
                return RangeTarget::Unsupported;
            }
            match media.param("encoding") {
                None | Some("delimited") => RangeTarget::Format(ExpositionFormat::ProtoDelimited),
                Some("text") => RangeTarget::Format(ExpositionFormat::ProtoText),
                Some(_) => RangeTarget::Unsupported,
            }
        }
        ("text", "plain") => match media.param("version") {
            None | Some("0.0.4") => RangeTarget::Format(ExpositionFormat::TextV0_0_4),
            Some(_) => RangeTarget::Unsupported,
        },
        ("application", "openmetrics-text") => match media.param("version") {
            Some("1.0.0") => RangeTarget::Format(ExpositionFormat::OpenMetricsV1_0_0),
            None | Some("0.0.1") => RangeTarget::Format(ExpositionFormat::OpenMetricsV0_0_1),
            Some(_) => RangeTarget::Unsupported,
        },
        _ => RangeTarget::Unsupported,
    }
}

fn parse_quality(raw: &str) -> Option<u16> {
    let value: f32 = raw.parse().ok()?;
    if !(0.0..=1.0).contains(&value) {
        return None;
    }
    Some((value * 1000.0).round() as u16)
}
