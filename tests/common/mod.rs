use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use link_ai::auth::{AuthenticatedUser, JwtValidator};
use link_ai::cache::{MemorySummaryCache, SummaryCache};
use link_ai::chat::{ChatStore, InMemoryChatStore};
use link_ai::config::Config;
use link_ai::privacy::{InMemoryPrivacyStore, PrivacyPolicy, PrivacyStore};
use link_ai::providers::{FakeProvider, Provider};
use link_ai::server::{build_router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret";

/// Router plus handles on every fake collaborator behind it
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub chat: Arc<InMemoryChatStore>,
    pub privacy: Arc<InMemoryPrivacyStore>,
    pub cache: Arc<MemorySummaryCache>,
}

#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.health.check_timeout_ms = 500;
    config
}

#[allow(dead_code)]
pub fn test_app() -> TestApp {
    test_app_with_config(test_config())
}

#[allow(dead_code)]
pub fn test_app_with_config(config: Config) -> TestApp {
    let provider = Arc::new(FakeProvider::new("llama3.2:latest"));
    let chat = Arc::new(InMemoryChatStore::new());
    let privacy = Arc::new(InMemoryPrivacyStore::new(PrivacyPolicy::from(&config.privacy)));
    let cache = Arc::new(MemorySummaryCache::new());

    let state = AppState::new(
        config,
        provider.clone() as Arc<dyn Provider>,
        chat.clone() as Arc<dyn ChatStore>,
        privacy.clone() as Arc<dyn PrivacyStore>,
        cache.clone() as Arc<dyn SummaryCache>,
    );

    TestApp {
        router: build_router(state.clone()),
        state,
        provider,
        chat,
        privacy,
        cache,
    }
}

#[allow(dead_code)]
pub fn user(user_id: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: user_id.to_string(),
        email: format!("{}@example.com", user_id),
        display_name: user_id.to_string(),
        role: "user".to_string(),
    }
}

#[allow(dead_code)]
pub fn token_for(config: &Config, user_id: &str) -> String {
    JwtValidator::from_config(&config.auth)
        .issue(&user(user_id), None)
        .expect("failed to issue test token")
}

impl TestApp {
    #[allow(dead_code)]
    pub fn token(&self, user_id: &str) -> String {
        token_for(&self.state.config, user_id)
    }

    /// Send a request through the full middleware stack
    #[allow(dead_code)]
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        send(&self.router, method, uri, token, body).await
    }
}

#[allow(dead_code)]
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).expect("failed to build request"))
        .await
        .expect("router is infallible")
}

#[allow(dead_code)]
pub async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    serde_json::from_slice(&bytes).expect("body is not JSON")
}

#[allow(dead_code)]
pub async fn expect_json(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    json_body(response).await
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
