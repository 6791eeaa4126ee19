use std::sync::{Mutex, PoisonError};

use tracing::debug;

/// Client-side navigation: where the viewer is, and moving them elsewhere.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> String;
    fn navigate(&self, route: &str);
}

/// In-process navigation history. The first entry is the starting route.
pub struct HistoryNavigator {
    history: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            history: Mutex::new(vec![start.into()]),
        }
    }

    /// Every route visited, starting route included.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Routes navigated to since construction.
    pub fn navigations(&self) -> Vec<String> {
        self.history().into_iter().skip(1).collect()
    }

    pub fn navigations_to(&self, route: &str) -> usize {
        self.navigations().iter().filter(|r| *r == route).count()
    }
}

impl Navigator for HistoryNavigator {
    fn current_route(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn navigate(&self, route: &str) {
        debug!(route, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(route.to_string());
    }
}
