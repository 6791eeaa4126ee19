//! Side-effect sinks the session layer talks to instead of a concrete UI:
//! transient notices and client-side navigation.

pub mod navigator;
pub mod notifier;

pub use navigator::{HistoryNavigator, Navigator};
pub use notifier::{Notice, NoticeLevel, NoticeLog, Notifier, TracingNotifier};
