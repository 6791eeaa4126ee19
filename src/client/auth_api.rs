use reqwest::Method;
use serde_json::Value;

use super::api_client::{ApiClient, RequestOptions};
use super::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, SignupRequest, TokenResponse, User};

/// The `/auth/*` endpoints. None of them retry.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::to_value(LoginRequest { email, password })
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.client
            .send(
                Method::POST,
                "/auth/login",
                Some(body),
                &[],
                RequestOptions::credentials(),
            )
            .await
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<AuthResponse, ApiError> {
        let body = serde_json::to_value(SignupRequest {
            username,
            email,
            password,
            full_name,
        })
        .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.client
            .send(
                Method::POST,
                "/auth/signup",
                Some(body),
                &[],
                RequestOptions::credentials(),
            )
            .await
    }

    /// The identity behind the stored token.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.client.get("/auth/me").await
    }

    /// A new token for the current session; no credentials are sent.
    pub async fn refresh(&self) -> Result<TokenResponse, ApiError> {
        self.client.post::<Value, _>("/auth/refresh", None).await
    }

    /// Tells the server the client is done with its token.
    pub async fn logout(&self) -> Result<Value, ApiError> {
        self.client.post::<Value, _>("/auth/logout", None).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::ApiConfig;
    use crate::storage::{MemoryStorage, TokenReader};
    use crate::ui::{HistoryNavigator, NoticeLog};
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(base_url: String, notices: Arc<NoticeLog>) -> ApiClient {
        let config = ApiConfig {
            base_url,
            ..ApiConfig::default()
        };
        ApiClient::new(
            &config,
            "/",
            TokenReader::new(Arc::new(MemoryStorage::new())),
            notices,
            Arc::new(HistoryNavigator::new("/")),
        )
        .unwrap()
    }

    fn user_json() -> Value {
        json!({
            "id": "1",
            "username": "ada",
            "email": "a@b.com",
            "full_name": null,
            "created_at": "2024-05-01T10:20:30.000000",
            "is_active": true
        })
    }

    #[tokio::test]
    async fn test_login_posts_credentials() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({"email": "a@b.com", "password": "pw"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"access_token": "t1", "user": user_json()}).to_string())
            .create_async()
            .await;

        let notices = Arc::new(NoticeLog::new());
        let response = client(server.url(), notices)
            .auth()
            .login("a@b.com", "pw")
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(response.access_token.as_str(), "t1");
        assert_eq!(response.user.username, "ada");
    }

    /// A refused login is a credentials problem, not an expired session.
    #[tokio::test]
    async fn test_rejected_login_carries_detail_without_notice() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"detail": "Incorrect email or password"}"#)
            .create_async()
            .await;

        let notices = Arc::new(NoticeLog::new());
        let error = client(server.url(), notices.clone())
            .auth()
            .login("a@b.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(
            error,
            ApiError::CredentialsRejected {
                status: 401,
                detail: Some("Incorrect email or password".to_string())
            }
        );
        assert!(notices.messages().is_empty());
    }

    #[tokio::test]
    async fn test_signup_sends_optional_full_name() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/auth/signup")
            .match_body(Matcher::Json(json!({
                "username": "ada",
                "email": "a@b.com",
                "password": "longenough",
                "full_name": "Ada Lovelace"
            })))
            .with_status(201)
            .with_body(json!({"access_token": "t1", "user": user_json()}).to_string())
            .create_async()
            .await;

        let notices = Arc::new(NoticeLog::new());
        let response = client(server.url(), notices)
            .auth()
            .signup("ada", "a@b.com", "longenough", Some("Ada Lovelace"))
            .await
            .unwrap();
        m.assert_async().await;
        assert_eq!(response.access_token.as_str(), "t1");
    }

    #[tokio::test]
    async fn test_refresh_and_logout_post_without_body() {
        let mut server = Server::new_async().await;
        let refresh = server
            .mock("POST", "/auth/refresh")
            .with_status(200)
            .with_body(r#"{"access_token": "t2", "token_type": "bearer", "expires_in": 1800}"#)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/logout")
            .with_status(200)
            .with_body(r#"{"message": "Logged out successfully"}"#)
            .create_async()
            .await;

        let notices = Arc::new(NoticeLog::new());
        let client = client(server.url(), notices);
        let token = client.auth().refresh().await.unwrap();
        let ack = client.auth().logout().await.unwrap();

        refresh.assert_async().await;
        logout.assert_async().await;
        assert_eq!(token.access_token.as_str(), "t2");
        assert_eq!(token.expires_in, Some(1800));
        assert_eq!(ack["message"], "Logged out successfully");
    }
}
