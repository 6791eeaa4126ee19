//! Gatekeeping for views that require a signed-in user.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::session::{Session, SessionState, SessionStore};
use crate::ui::Navigator;

/// What a guarded view should do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// The session has not settled; show a placeholder.
    Loading,
    /// Nobody is signed in; go to this route instead.
    Redirect(String),
    Render,
}

#[derive(Clone)]
pub struct RouteGuard {
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
    landing_route: String,
}

impl RouteGuard {
    pub fn new(
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
        landing_route: impl Into<String>,
    ) -> Self {
        Self {
            session,
            navigator,
            landing_route: landing_route.into(),
        }
    }

    /// Decision for a session snapshot. Looks at the state, not the loading
    /// flag, so a login in flight does not blank an already-rendered view.
    pub fn evaluate(&self, session: &Session) -> GuardDecision {
        match session.state {
            SessionState::Uninitialized | SessionState::Checking => GuardDecision::Loading,
            SessionState::Anonymous => GuardDecision::Redirect(self.landing_route.clone()),
            SessionState::Authenticated(_) => GuardDecision::Render,
        }
    }

    /// Decision for the current session, without side effects.
    pub fn check(&self) -> GuardDecision {
        self.evaluate(&self.session.current_session())
    }

    /// Waits for the initial check, then applies the decision.
    pub async fn resolve(&self) -> GuardDecision {
        self.session.initialize().await;
        let decision = self.check();
        self.apply(&decision);
        decision
    }

    /// Follows the session so a guarded view can react to a sign-out that
    /// happened elsewhere.
    pub fn watch(&self) -> GuardWatch {
        let receiver = self.session.subscribe();
        let last = self.evaluate(&receiver.borrow());
        GuardWatch {
            guard: self.clone(),
            receiver,
            last,
        }
    }

    fn apply(&self, decision: &GuardDecision) {
        let GuardDecision::Redirect(route) = decision else {
            return;
        };
        if self.navigator.current_route() == *route {
            debug!(route = %route, "Already on the redirect target");
            return;
        }
        info!(route = %route, "Not signed in; redirecting");
        self.navigator.navigate(route);
    }
}

pub struct GuardWatch {
    guard: RouteGuard,
    receiver: watch::Receiver<Session>,
    last: GuardDecision,
}

impl GuardWatch {
    /// The decision currently in force.
    pub fn current(&self) -> &GuardDecision {
        &self.last
    }

    /// Waits until the decision differs from the last one, applies it and
    /// returns it. `None` once the session store is gone.
    pub async fn next_decision(&mut self) -> Option<GuardDecision> {
        loop {
            self.receiver.changed().await.ok()?;
            let decision = self.guard.evaluate(&self.receiver.borrow_and_update());
            if decision != self.last {
                self.guard.apply(&decision);
                self.last = decision.clone();
                return Some(decision);
            }
        }
    }
}
