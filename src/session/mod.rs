//! Session lifecycle: who is signed in, the token they hold, and when it is
//! refreshed.

pub mod refresh;
pub mod state;
pub mod store;

pub use refresh::RefreshSchedule;
pub use state::{Session, SessionState};
pub use store::{RefreshOutcome, SessionError, SessionStore, LOGGED_OUT};
