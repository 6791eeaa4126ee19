#![allow(dead_code)]

use std::sync::Arc;

use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use serde_json::{json, Value};
use studio_session::config::{Config, ConfigV1};
use studio_session::models::AuthToken;
use studio_session::session::RefreshSchedule;
use studio_session::startup;
use studio_session::state::AppState;
use studio_session::storage::TokenStorage;
use studio_session::ui::{HistoryNavigator, NoticeLog};

pub const TEST_CONFIG: &str = r#"
version: "1.0.0"
api:
  timeout_in_ms: 2000
  query_retries: 0
session:
  landing_route: "/"
  dashboard_route: "/dashboard"
storage:
  type: "memory"
logging:
  level: "debug"
  format: "console"
"#;

/// Everything a test needs to drive the session layer and observe its side
/// effects.
pub struct TestApp {
    pub state: AppState,
    pub notices: Arc<NoticeLog>,
    pub navigator: Arc<HistoryNavigator>,
}

impl TestApp {
    pub async fn seed_token(&self, token: &str) {
        self.state
            .storage
            .set(&AuthToken::new(token).unwrap())
            .await
            .unwrap();
    }

    pub async fn stored_token(&self) -> Option<String> {
        self.state
            .storage
            .get()
            .await
            .unwrap()
            .map(|t| t.as_str().to_string())
    }
}

pub fn load_test_config(base_url: &str) -> ConfigV1 {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Yaml::string(TEST_CONFIG))
        .extract()
        .expect("Failed to parse test config YAML");
    let Config::ConfigV1(mut config) = config;
    config.api.base_url = base_url.to_string();
    config
}

/// Test config that refreshes every `interval_ms`.
pub fn load_fast_refresh_config(base_url: &str, interval_ms: u64) -> ConfigV1 {
    let mut config = load_test_config(base_url);
    config.session.refresh = RefreshSchedule::Fixed { interval_ms };
    config
}

pub fn build_app(config: ConfigV1, start_route: &str) -> TestApp {
    let notices = Arc::new(NoticeLog::new());
    let navigator = Arc::new(HistoryNavigator::new(start_route));
    let state = startup::build(Arc::new(config), notices.clone(), navigator.clone())
        .expect("failed to build app");
    TestApp {
        state,
        notices,
        navigator,
    }
}

pub fn user_json() -> Value {
    json!({
        "id": "1",
        "username": "ada",
        "email": "a@b.com",
        "full_name": "Ada Lovelace",
        "created_at": "2024-05-01T10:20:30.123456",
        "is_active": true
    })
}

pub fn auth_body(token: &str) -> String {
    json!({
        "access_token": token,
        "token_type": "bearer",
        "user": user_json()
    })
    .to_string()
}
