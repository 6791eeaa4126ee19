use crate::models::User;

/// Where the session is in its lifecycle.
///
/// The identity only exists inside `Authenticated`, so "authenticated" and
/// "identity present" cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been checked yet.
    Uninitialized,
    /// The stored token is being verified.
    Checking,
    Authenticated(User),
    Anonymous,
}

/// A snapshot of the session as consumers see it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub state: SessionState,
    /// A request on behalf of the session is in flight.
    pub loading: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            loading: true,
        }
    }

    pub(crate) fn checking() -> Self {
        Self {
            state: SessionState::Checking,
            loading: true,
        }
    }

    pub(crate) fn authenticated(user: User) -> Self {
        Self {
            state: SessionState::Authenticated(user),
            loading: false,
        }
    }

    pub(crate) fn anonymous() -> Self {
        Self {
            state: SessionState::Anonymous,
            loading: false,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match &self.state {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }

    /// The initial check has settled one way or the other.
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.state,
            SessionState::Authenticated(_) | SessionState::Anonymous
        )
    }

    pub fn phase(&self) -> &'static str {
        match self.state {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Checking => "checking",
            SessionState::Authenticated(_) => "authenticated",
            SessionState::Anonymous => "anonymous",
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: "1".to_string(),
            username: "ada".to_string(),
            email: "a@b.com".to_string(),
            full_name: None,
            created_at: Utc::now(),
            is_active: true,
        }
    }

    #[test]
    fn test_new_session_is_loading_and_unresolved() {
        let session = Session::new();
        assert!(session.loading);
        assert!(!session.is_resolved());
        assert!(!session.is_authenticated());
        assert_eq!(session.phase(), "uninitialized");
    }

    #[test]
    fn test_authenticated_exposes_identity() {
        let session = Session::authenticated(user());
        assert!(session.is_authenticated());
        assert!(session.is_resolved());
        assert!(!session.loading);
        assert_eq!(session.user().map(|u| u.username.as_str()), Some("ada"));
    }

    #[test]
    fn test_anonymous_has_no_identity() {
        let session = Session::anonymous();
        assert_eq!(session.user(), None);
        assert!(session.is_resolved());
        assert_eq!(session.phase(), "anonymous");
    }
}
