// Test utilities for driving the bridge router against mock backends
use axum::{body::Body, http::Request, Router};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;
use wiremock::MockServer;

use metrics_bridge::config::{
    AdminConfig, AppConfig, LogConfig, ScrapeConfig, ServerConfig,
};
use metrics_bridge::handlers::{health, metrics};
use metrics_bridge::scrape::runner::ScrapeTarget;
use metrics_bridge::scrape::url::QueryModifier;
use metrics_bridge::state::AppState;

pub struct TestServer {
    pub app: Router,
}

impl TestServer {
    /// Builds the router around an explicit scrape plan, usually pointed at
    /// `wiremock` backends.
    pub fn with_targets(targets: Vec<ScrapeTarget>) -> Self {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                max_request_size: 1024 * 1024,
            },
            admin: AdminConfig {
                address: "127.0.0.1".to_string(),
                port: 9901,
                path: "/stats".to_string(),
            },
            scrape: ScrapeConfig {
                timeout_secs: 2,
                applications: String::new(),
            },
            log: LogConfig {
                level: "error".to_string(), // Quiet during tests
                format: "pretty".to_string(),
            },
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.scrape.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        let state = AppState {
            config: Arc::new(config),
            targets: Arc::new(targets),
            http,
        };

        let app = Router::new()
            .route("/health", axum::routing::get(health::health_check))
            .route(
                "/metrics",
                axum::routing::get(metrics::merged_metrics_handler),
            )
            .with_state(state);

        Self { app }
    }

    pub async fn call(&self, req: Request<Body>) -> axum::response::Response {
        self.app.clone().oneshot(req).await.unwrap()
    }

    pub fn make_request(&self, uri: &str, accept: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(accept) = accept {
            builder = builder.header("Accept", accept);
        }
        builder.body(Body::empty()).unwrap()
    }
}

/// A scrape target pointing at a mock backend, with the query handling the
/// admin endpoint gets.
pub fn admin_target(server: &MockServer) -> ScrapeTarget {
    let addr = server.address();
    ScrapeTarget {
        name: "admin".to_string(),
        address: addr.ip().to_string(),
        port: addr.port(),
        path: "/stats".to_string(),
        modifier: QueryModifier::AddPrometheusFormat,
    }
}

/// A scrape target pointing at a mock backend, with the query handling an
/// application endpoint gets.
pub fn app_target(name: &str, server: &MockServer) -> ScrapeTarget {
    let addr = server.address();
    ScrapeTarget {
        name: name.to_string(),
        address: addr.ip().to_string(),
        port: addr.port(),
        path: "/metrics".to_string(),
        modifier: QueryModifier::RemoveQueryParameters,
    }
}

/// A target nothing listens on, to simulate a dead backend.
pub fn dead_target(name: &str) -> ScrapeTarget {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("binds");
        listener.local_addr().expect("has addr").port()
    };
    ScrapeTarget {
        name: name.to_string(),
        address: "127.0.0.1".to_string(),
        port,
        path: "/metrics".to_string(),
        modifier: QueryModifier::RemoveQueryParameters,
    }
}
