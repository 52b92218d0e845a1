//! Selection of the single exposition format for a merged response.

use std::collections::HashSet;

use super::accept::{AcceptPreference, RangeTarget};
use super::collector::FormatCollector;
use super::format::ExpositionFormat;

/// Resolution order when a wildcard range has to choose among several
/// formats the backends produced: most expressive first.
const WILDCARD_RESOLUTION: [ExpositionFormat; 4] = [
    ExpositionFormat::OpenMetricsV1_0_0,
    ExpositionFormat::OpenMetricsV0_0_1,
    ExpositionFormat::ProtoDelimited,
    ExpositionFormat::TextV0_0_4,
];

/// Waits for every backend to report, then picks the one format to serve.
///
/// Always yields a servable format. The outcome depends only on the *set* of
/// reported formats and the collector's preferences, never on the order in
/// which backends finished.
pub async fn negotiate(collector: FormatCollector, accept: Option<&str>) -> ExpositionFormat {
    let reports = collector.drain().await;
    let produced: HashSet<ExpositionFormat> = reports
        .iter()
        .filter_map(|report| report.servable_format())
        .collect();
    decide(&produced, &AcceptPreference::parse(accept))
}

/// The pure decision underneath [`negotiate`].
///
/// Intersection first: the highest-priority preference that a backend
/// actually produced wins. Failing that, a collector that named at least one
/// concrete format gets the best format it asked for, and a collector that
/// only said "anything" gets plain text, which every consumer can parse.
pub fn decide(
    produced: &HashSet<ExpositionFormat>,
    preferences: &AcceptPreference,
) -> ExpositionFormat {
    if !produced.is_empty() {
        for entry in preferences.entries() {
            match &entry.target {
                RangeTarget::Format(format) => {
                    if format.is_servable() && produced.contains(format) {
                        return *format;
                    }
                }
                RangeTarget::AnySubtype(main) => {
                    if let Some(format) = resolve_wildcard(produced, Some(main)) {
                        return format;
                    }
                }
                RangeTarget::Any => {
                    if let Some(format) = resolve_wildcard(produced, None) {
                        return format;
                    }
                }
                RangeTarget::Unsupported => {}
            }
        }
    }

    // No usable intersection. Honor the richest format the collector named,
    // if it named one at all.
    for entry in preferences.entries() {
        if let RangeTarget::Format(format) = &entry.target {
            if format.is_servable() {
                return *format;
            }
        }
    }

    ExpositionFormat::TextV0_0_4
}

fn resolve_wildcard(
    produced: &HashSet<ExpositionFormat>,
    main_type: Option<&str>,
) -> Option<ExpositionFormat> {
    WILDCARD_RESOLUTION
        .iter()
        .copied()
        .find(|format| {
            produced.contains(format)
                && main_type.map_or(true, |main| format.main_type() == Some(main))
        })
}
