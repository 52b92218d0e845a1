use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::scrape::collector::FormatReport;
use crate::scrape::runner::{run_scrape, MergedScrape};
use crate::state::AppState;

const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";
const FALLBACK_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET `/metrics`: one scrape of every configured backend, merged into a
/// single response in the negotiated exposition format.
pub async fn merged_metrics_handler(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let scrape_id = Uuid::new_v4();
    let span = tracing::info_span!("scrape_cycle", id = %scrape_id);

    async move {
        let original = match original_scrape_url(&headers, &uri) {
            Ok(url) => url,
            Err(e) => {
                error!("failed to reconstruct scrape URL: {e}");
                return (StatusCode::BAD_REQUEST, "invalid scrape request URL").into_response();
            }
        };

        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok());

        let merged = run_scrape(&state.http, &state.targets, &original, accept).await;
        info!(
            format = ?merged.format,
            backends = merged.outcomes.len(),
            "scrape cycle complete"
        );

        build_merged_response(merged)
    }
    .instrument(span)
    .await
}

fn original_scrape_url(headers: &HeaderMap, uri: &Uri) -> Result<Url, url::ParseError> {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    Url::parse(&format!("http://{host}{uri}"))
}

fn build_merged_response(merged: MergedScrape) -> Response {
    let content_type = merged
        .format
        .content_type()
        .unwrap_or(FALLBACK_CONTENT_TYPE);

    let mut body = String::new();
    for outcome in &merged.outcomes {
        let Some(text) = outcome.body.as_deref() else {
            continue;
        };
        if outcome.report != FormatReport::Classified(merged.format) {
            warn!(
                target = %outcome.target,
                selected = ?merged.format,
                "dropping backend body whose format does not match the negotiated one"
            );
            continue;
        }
        debug!(target = %outcome.target, bytes = text.len(), "merging backend body");
        body.push_str(text);
        if !text.ends_with('\n') && !text.is_empty() {
            body.push('\n');
        }
    }

    match Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        )
        .body(body.into())
    {
        Ok(response) => response,
        Err(e) => {
            error!("failed to build merged metrics response: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}
