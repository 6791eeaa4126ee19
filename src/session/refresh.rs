use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::AuthToken;

/// Tokens live 30 minutes; refresh with five to spare.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 25 * 60 * 1000;
pub const DEFAULT_REFRESH_MARGIN_MS: u64 = 5 * 60 * 1000;
/// Floor for every delay, so a tiny interval or a nearly-expired token does not spin.
pub const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// When the silent refresh fires after a token is stored.
#[derive(Deserialize, Serialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "mode")]
pub enum RefreshSchedule {
    /// Same wall-clock interval for every token.
    #[serde(rename = "fixed")]
    Fixed {
        #[serde(default = "default_interval_ms")]
        interval_ms: u64,
    },
    /// Token lifetime minus a margin. The lifetime comes from the server's
    /// `expires_in`, else the token's `exp` claim, else the fallback interval
    /// is used as-is.
    #[serde(rename = "expiry")]
    ExpiryDerived {
        #[serde(default = "default_margin_ms")]
        margin_ms: u64,
        #[serde(default = "default_interval_ms")]
        fallback_interval_ms: u64,
    },
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        RefreshSchedule::Fixed {
            interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
        }
    }
}

impl RefreshSchedule {
    /// Delay before refreshing `token`. `expires_in_secs` is the lifetime the
    /// server announced alongside it, if any.
    pub fn delay_for(&self, token: &AuthToken, expires_in_secs: Option<u64>) -> Duration {
        match self {
            RefreshSchedule::Fixed { interval_ms } => {
                Duration::from_millis(*interval_ms).max(MIN_REFRESH_DELAY)
            }
            RefreshSchedule::ExpiryDerived {
                margin_ms,
                fallback_interval_ms,
            } => {
                let lifetime = expires_in_secs
                    .map(Duration::from_secs)
                    .or_else(|| token.remaining_lifetime());
                match lifetime {
                    Some(lifetime) => lifetime
                        .saturating_sub(Duration::from_millis(*margin_ms))
                        .max(MIN_REFRESH_DELAY),
                    None => Duration::from_millis(*fallback_interval_ms),
                }
            }
        }
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

fn default_margin_ms() -> u64 {
    DEFAULT_REFRESH_MARGIN_MS
}
