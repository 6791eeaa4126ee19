//! Application wiring.
//!
//! Builds the token storage, the API client, the session store and the route
//! guard from configuration and connects them: the client reads the token
//! through a read-only view and reports 401s back to the store.

use std::sync::Arc;

use tracing::info;

use crate::client::{ApiClient, ApiError};
use crate::config::ConfigV1;
use crate::guard::RouteGuard;
use crate::session::SessionStore;
use crate::state::AppState;
use crate::storage::{create_storage, TokenReader};
use crate::ui::{HistoryNavigator, Navigator, Notifier, TracingNotifier};

/// Wires the application around the given notice and navigation sinks.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub fn build(
    config: Arc<ConfigV1>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
) -> Result<AppState, ApiError> {
    let storage = create_storage(&config.storage);

    let client = Arc::new(ApiClient::new(
        &config.api,
        config.session.landing_route.clone(),
        TokenReader::new(storage.clone()),
        notifier.clone(),
        navigator.clone(),
    )?);

    let session = SessionStore::new(
        client.clone(),
        storage.clone(),
        notifier.clone(),
        navigator.clone(),
        &config.session,
    );

    let guard = RouteGuard::new(
        session.clone(),
        navigator.clone(),
        config.session.landing_route.clone(),
    );

    info!(
        api = %client.base_url(),
        storage = %storage.describe(),
        "Session layer ready"
    );

    Ok(AppState {
        config,
        client,
        session,
        guard,
        navigator,
        notifier,
        storage,
    })
}

/// [`build`] with notices sent to the log and an in-memory history that
/// starts on the landing route.
pub fn build_default(config: Arc<ConfigV1>) -> Result<AppState, ApiError> {
    let navigator = Arc::new(HistoryNavigator::new(
        config.session.landing_route.clone(),
    ));
    build(config, Arc::new(TracingNotifier::new()), navigator)
}
