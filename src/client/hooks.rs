use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use reqwest::RequestBuilder;
use tracing::{debug, info, warn};

use super::error::ApiError;
use crate::storage::TokenReader;
use crate::ui::{Navigator, Notice, Notifier};

pub const SESSION_EXPIRED: &str = "Session expired. Please login again.";
pub const ACCESS_DENIED: &str = "Access denied";
pub const NOT_FOUND: &str = "Resource not found";
pub const SERVER_ERROR: &str = "Server error. Please try again later.";
pub const TIMEOUT: &str = "Request timeout. Please try again.";
pub const NETWORK_ERROR: &str = "Network error. Please check your connection.";

/// Whatever owns the session. Called by the response hook on a 401 so the
/// stored token and identity are dropped by their owner.
#[async_trait]
pub trait SessionExpiryHandler: Send + Sync {
    async fn session_expired(&self);
}

/// The outgoing and incoming hooks applied to every request.
pub struct Hooks {
    tokens: TokenReader,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    landing_route: String,
    expiry_handler: RwLock<Option<Weak<dyn SessionExpiryHandler>>>,
}

impl Hooks {
    pub fn new(
        tokens: TokenReader,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        landing_route: impl Into<String>,
    ) -> Self {
        Self {
            tokens,
            notifier,
            navigator,
            landing_route: landing_route.into(),
            expiry_handler: RwLock::new(None),
        }
    }

    pub fn set_expiry_handler(&self, handler: Weak<dyn SessionExpiryHandler>) {
        *self
            .expiry_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn expiry_handler(&self) -> Option<Arc<dyn SessionExpiryHandler>> {
        self.expiry_handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Attaches `Authorization: Bearer <token>` when a token is stored.
    pub async fn outgoing(&self, request: RequestBuilder) -> RequestBuilder {
        match self.tokens.current().await {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }

    /// Applies the side effect for a failed request. The caller still gets
    /// the error afterwards.
    pub async fn incoming(&self, error: &ApiError) {
        match error {
            ApiError::AuthenticationExpired => self.expire_session().await,
            ApiError::AuthorizationDenied => self.notify(ACCESS_DENIED),
            ApiError::ResourceMissing => self.notify(NOT_FOUND),
            ApiError::ServerFault { .. } => self.notify(SERVER_ERROR),
            ApiError::RequestTimedOut => self.notify(TIMEOUT),
            ApiError::NetworkUnavailable(_) => self.notify(NETWORK_ERROR),
            ApiError::CredentialsRejected { .. }
            | ApiError::Rejected { .. }
            | ApiError::Decode(_)
            | ApiError::InvalidRequest(_) => {
                debug!(error = %error, "No central handling for this failure");
            }
        }
    }

    async fn expire_session(&self) {
        match self.expiry_handler() {
            Some(handler) => handler.session_expired().await,
            None => {
                warn!("Received 401 but no session owner is registered; clearing token");
                self.tokens.discard().await;
            }
        }

        // Already on the landing route: nothing to redirect, no loop.
        if self.navigator.current_route() != self.landing_route {
            info!(route = %self.landing_route, "Session expired; redirecting");
            self.notify(SESSION_EXPIRED);
            self.navigator.navigate(&self.landing_route);
        }
    }

    fn notify(&self, message: &str) {
        self.notifier.notify(Notice::error(message));
    }
}
