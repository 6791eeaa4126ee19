//! Shared application state.
//!
//! Everything a consumer view needs, wired once by [`crate::startup::build`].

use std::sync::Arc;

use crate::client::ApiClient;
use crate::config::ConfigV1;
use crate::guard::RouteGuard;
use crate::session::SessionStore;
use crate::storage::TokenStorage;
use crate::ui::{Navigator, Notifier};

/// Application state handed to every consumer.
///
/// Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded at startup.
    pub config: Arc<ConfigV1>,
    /// Request pipeline with the bearer and error hooks installed.
    pub client: Arc<ApiClient>,
    /// The single owner of identity and token.
    pub session: SessionStore,
    /// Gate for views that require a signed-in user.
    pub guard: RouteGuard,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    /// Durable token storage. Only `session` writes to it.
    pub storage: Arc<dyn TokenStorage>,
}
