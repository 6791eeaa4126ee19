pub mod api_client;
pub mod auth_api;
pub mod error;
pub mod hooks;
pub mod resources;

// Re-export so callers can do "use crate::client::{ApiClient, ApiError};"
pub use api_client::{ApiClient, RequestOptions};
pub use auth_api::AuthApi;
pub use error::ApiError;
pub use hooks::{Hooks, SessionExpiryHandler};
pub use resources::{HistoryQuery, ResourceApi};
