//! Concurrent execution of one scrape cycle across all configured backends.

use futures::future::join_all;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AdminConfig, ApplicationEndpoint};

use super::collector::{FormatCollector, FormatReport};
use super::format::ExpositionFormat;
use super::negotiate::negotiate;
use super::url::{rewrite_metrics_url, QueryModifier};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend returned status {status}")]
    BackendStatus { status: StatusCode },
}

/// One backend to scrape, with the query transformation its endpoint needs.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub path: String,
    pub modifier: QueryModifier,
}

/// Builds the scrape plan: the proxy admin endpoint first (its stats endpoint
/// speaks Prometheus only when asked via `format=prometheus`), then every
/// configured application endpoint with the inbound query stripped.
pub fn build_targets(admin: &AdminConfig, applications: &[ApplicationEndpoint]) -> Vec<ScrapeTarget> {
    let mut targets = Vec::with_capacity(applications.len() + 1);
    targets.push(ScrapeTarget {
        name: "admin".to_string(),
        address: admin.address.clone(),
        port: admin.port,
        path: admin.path.clone(),
        modifier: QueryModifier::AddPrometheusFormat,
    });
    for endpoint in applications {
        targets.push(ScrapeTarget {
            name: endpoint.name.clone(),
            address: endpoint.address.clone(),
            port: endpoint.port,
            path: endpoint.path.clone(),
            modifier: QueryModifier::RemoveQueryParameters,
        });
    }
    targets
}

/// What one backend contributed to the cycle.
#[derive(Debug)]
pub struct ScrapeOutcome {
    pub target: String,
    pub report: FormatReport,
    pub body: Option<String>,
}

/// A finished scrape cycle: the negotiated output format plus every backend's
/// contribution.
#[derive(Debug)]
pub struct MergedScrape {
    pub format: ExpositionFormat,
    pub outcomes: Vec<ScrapeOutcome>,
}

/// Fans out one scrape task per target, waits for every backend to report,
/// and negotiates the response format against the collector's `Accept`
/// header. A backend that fails or times out contributes an `Absent` report,
/// so the cycle always completes.
pub async fn run_scrape(
    client: &reqwest::Client,
    targets: &[ScrapeTarget],
    original: &Url,
    accept: Option<&str>,
) -> MergedScrape {
    let (sink, collector) = FormatCollector::channel(targets.len());

    let mut handles = Vec::with_capacity(targets.len());
    for target in targets {
        let client = client.clone();
        let target = target.clone();
        let original = original.clone();
        let accept = accept.map(str::to_owned);
        let sink = sink.clone();
        handles.push(tokio::spawn(async move {
            let outcome = scrape_target(&client, &target, &original, accept.as_deref()).await;
            sink.report(outcome.report).await;
            outcome
        }));
    }
    drop(sink);

    let format = negotiate(collector, accept).await;

    let results = join_all(handles).await;
    let outcomes = results
        .into_iter()
        .zip(targets)
        .map(|(result, target)| match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(target = %target.name, "scrape task failed: {e}");
                ScrapeOutcome {
                    target: target.name.clone(),
                    report: FormatReport::Absent,
                    body: None,
                }
            }
        })
        .collect();

    MergedScrape { format, outcomes }
}

async fn scrape_target(
    client: &reqwest::Client,
    target: &ScrapeTarget,
    original: &Url,
    accept: Option<&str>,
) -> ScrapeOutcome {
    let url = rewrite_metrics_url(
        &target.address,
        target.port,
        &target.path,
        target.modifier,
        original,
    );
    debug!(target = %target.name, %url, "scraping backend");

    match fetch(client, &url, accept).await {
        Ok((format, body)) => ScrapeOutcome {
            target: target.name.clone(),
            report: FormatReport::Classified(format),
            body: Some(body),
        },
        Err(e) => {
            warn!(target = %target.name, %url, "backend scrape failed: {e}");
            ScrapeOutcome {
                target: target.name.clone(),
                report: FormatReport::Absent,
                body: None,
            }
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    accept: Option<&str>,
) -> Result<(ExpositionFormat, String), ScrapeError> {
    let mut request = client.get(url);
    if let Some(accept) = accept {
        request = request.header(ACCEPT, accept);
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::BackendStatus { status });
    }

    let format = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ExpositionFormat::classify)
        .unwrap_or(ExpositionFormat::Unknown);
    let body = response.text().await?;

    Ok((format, body))
}
