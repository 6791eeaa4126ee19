//! Product endpoints outside the session core. Payloads stay raw JSON: the
//! session layer only needs them to travel through the same hooks.

use serde_json::{json, Value};

use super::api_client::ApiClient;
use super::error::ApiError;

/// Filters for `GET /history`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryQuery {
    /// "chat" or "image".
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl HistoryQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(kind) = &self.kind {
            params.push(("type", kind.clone()));
        }
        if let Some(start) = &self.start_date {
            params.push(("start_date", start.clone()));
        }
        if let Some(end) = &self.end_date {
            params.push(("end_date", end.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        params
    }
}

pub struct ResourceApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ResourceApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    // -- Chat

    pub async fn send_chat_message(&self, request: &Value) -> Result<Value, ApiError> {
        self.client.post("/chat", Some(request)).await
    }

    pub async fn chat_sessions(&self) -> Result<Value, ApiError> {
        self.client.query("/chat/sessions", &[]).await
    }

    pub async fn chat_session(&self, session_id: &str) -> Result<Value, ApiError> {
        let path = format!("/chat/sessions/{}", self.client.segment(session_id));
        self.client.query(&path, &[]).await
    }

    pub async fn delete_chat_session(&self, session_id: &str) -> Result<Value, ApiError> {
        let path = format!("/chat/sessions/{}", self.client.segment(session_id));
        self.client.delete(&path, &[]).await
    }

    pub fn chat_stream_url(&self) -> String {
        self.client.url("/chat/stream")
    }

    // -- Image generation

    pub async fn generate_image(&self, request: &Value) -> Result<Value, ApiError> {
        self.client.post("/generate/image", Some(request)).await
    }

    pub async fn generation_status(&self, generation_id: &str) -> Result<Value, ApiError> {
        let path = format!("/generate/image/{}/status", self.client.segment(generation_id));
        self.client.query(&path, &[]).await
    }

    pub async fn cancel_generation(&self, generation_id: &str) -> Result<Value, ApiError> {
        let path = format!("/generate/image/{}", self.client.segment(generation_id));
        self.client.delete(&path, &[]).await
    }

    pub async fn image_models(&self) -> Result<Value, ApiError> {
        self.client.query("/generate/models", &[]).await
    }

    pub async fn image_styles(&self) -> Result<Value, ApiError> {
        self.client.query("/generate/styles", &[]).await
    }

    pub fn image_stream_url(&self, generation_id: &str) -> String {
        let path = format!("/generate/image/{}/stream", self.client.segment(generation_id));
        self.client.url(&path)
    }

    // -- History

    pub async fn history(&self, filter: &HistoryQuery) -> Result<Value, ApiError> {
        self.client.query("/history", &filter.params()).await
    }

    pub async fn history_stats(&self) -> Result<Value, ApiError> {
        self.client.query("/history/stats", &[]).await
    }

    pub async fn toggle_image_favorite(&self, image_id: &str) -> Result<Value, ApiError> {
        let path = format!("/history/images/{}/favorite", self.client.segment(image_id));
        self.client.post::<Value, _>(&path, None).await
    }

    pub async fn clear_history(&self, kind: Option<&str>) -> Result<Value, ApiError> {
        let params: Vec<(&str, String)> = kind
            .map(|k| vec![("type", k.to_string())])
            .unwrap_or_default();
        self.client.delete("/history/clear", &params).await
    }

    // -- Account

    pub async fn profile(&self) -> Result<Value, ApiError> {
        self.client.query("/user/profile", &[]).await
    }

    pub async fn update_profile(&self, full_name: Option<&str>) -> Result<Value, ApiError> {
        self.client
            .put("/user/profile", &json!({ "full_name": full_name }))
            .await
    }

    pub async fn settings(&self) -> Result<Value, ApiError> {
        self.client.query("/user/settings", &[]).await
    }

    pub async fn update_settings(&self, settings: &Value) -> Result<Value, ApiError> {
        self.client.put("/user/settings", settings).await
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<Value, ApiError> {
        let body = json!({
            "current_password": current_password,
            "new_password": new_password,
        });
        self.client.post("/user/change-password", Some(&body)).await
    }

    pub async fn usage_stats(&self) -> Result<Value, ApiError> {
        self.client.query("/user/usage-stats", &[]).await
    }
}
