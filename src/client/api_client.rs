use std::sync::{Arc, Weak};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::auth_api::AuthApi;
use super::error::{extract_detail, ApiError};
use super::hooks::{Hooks, SessionExpiryHandler};
use super::resources::ResourceApi;
use crate::config::ApiConfig;
use crate::storage::TokenReader;
use crate::ui::{Navigator, Notifier};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Login/signup: a 4xx means the credentials were refused, not that a
    /// session expired.
    pub credential_submission: bool,
    /// Extra attempts after a transient failure.
    pub retries: u32,
}

impl RequestOptions {
    pub fn credentials() -> Self {
        Self {
            credential_submission: true,
            retries: 0,
        }
    }

    pub fn with_retries(retries: u32) -> Self {
        Self {
            credential_submission: false,
            retries,
        }
    }
}

/// The request pipeline: base URL, bounded timeout, and the two hooks.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    base: Url,
    hooks: Hooks,
    query_retries: u32,
    retry_base_delay: Duration,
}

impl ApiClient {
    pub fn new(
        config: &ApiConfig,
        landing_route: impl Into<String>,
        tokens: TokenReader,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let base = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidRequest(format!("Invalid base URL: {}", config.base_url)))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to build HTTP client: {e}")))?;

        info!(
            base_url = %config.base_url,
            timeout_in_ms = config.timeout_in_ms,
            "Creating API client"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            base,
            hooks: Hooks::new(tokens, notifier, navigator, landing_route),
            query_retries: config.query_retries,
            retry_base_delay: config.retry_base_delay(),
        })
    }

    /// Percent-encodes `raw` as a single path segment, so an id can never
    /// add path levels or start a query.
    pub fn segment(&self, raw: &str) -> String {
        let mut url = self.base.clone();
        url.set_query(None);
        url.set_fragment(None);
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.clear().push(raw);
            }
            Err(()) => return raw.to_string(),
        }
        url.path().trim_start_matches('/').to_string()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins `path` onto the base URL with exactly one slash.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Registers the session owner the 401 hook reports to.
    pub fn set_expiry_handler(&self, handler: Weak<dyn SessionExpiryHandler>) {
        self.hooks.set_expiry_handler(handler);
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn resources(&self) -> ResourceApi<'_> {
        ResourceApi::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(Method::GET, path, None, &[], RequestOptions::default())
            .await
    }

    /// GET that retries transient failures, for idempotent resource reads.
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.send(
            Method::GET,
            path,
            None,
            params,
            RequestOptions::with_retries(self.query_retries),
        )
        .await
    }

    pub async fn post<B, T>(&self, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(to_json).transpose()?;
        self.send(Method::POST, path, body, &[], RequestOptions::default())
            .await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.send(Method::PUT, path, Some(body), &[], RequestOptions::default())
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        self.send(Method::DELETE, path, None, params, RequestOptions::default())
            .await
    }

    /// Runs one call through the pipeline. The incoming hook sees only the
    /// final outcome, after any retries.
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        params: &[(&str, String)],
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut attempt = 0;

        let outcome = loop {
            match self
                .dispatch(method.clone(), &url, body.as_ref(), params, options)
                .await
            {
                Err(error) if error.is_transient() && attempt < options.retries => {
                    let delay = self.retry_delay(attempt);
                    debug!(
                        %method,
                        path,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => break other,
            }
        };

        match outcome {
            Ok(bytes) => decode(&bytes),
            Err(error) => {
                debug!(%method, path, error = %error, "Request failed");
                self.hooks.incoming(&error).await;
                Err(error)
            }
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        params: &[(&str, String)],
        options: RequestOptions,
    ) -> Result<Vec<u8>, ApiError> {
        let mut request = self.http.request(method, url);
        if !params.is_empty() {
            request = request.query(params);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.hooks.outgoing(request).await;

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;
        let status = response.status();

        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ApiError::from_transport(&e))?;
            return Ok(bytes.to_vec());
        }

        // The body only matters for its `detail`; a failed read just loses it.
        let text = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(
            status,
            extract_detail(&text),
            options.credential_submission,
        ))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_base_delay
            .saturating_mul(factor)
            .min(MAX_RETRY_DELAY)
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null).map_err(|e| ApiError::Decode(e.to_string()));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode(e.to_string()))
}
