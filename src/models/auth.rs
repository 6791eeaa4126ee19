use serde::{Deserialize, Serialize};

use super::token::AuthToken;
use super::user::User;

/// Body of `POST /auth/login`.
#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Body of `POST /auth/signup`. An absent full name is left out of the payload.
#[derive(Serialize, Debug)]
pub struct SignupRequest<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'a str>,
}

/// What login and signup return: a fresh token together with the identity it belongs to.
#[derive(Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub access_token: AuthToken,
    pub user: User,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// What `POST /auth/refresh` returns.
#[derive(Deserialize, Debug, Clone)]
pub struct TokenResponse {
    pub access_token: AuthToken,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}
