use crate::config::AppConfig;
use crate::scrape::runner::ScrapeTarget;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub targets: Arc<Vec<ScrapeTarget>>,
    pub http: reqwest::Client,
}
