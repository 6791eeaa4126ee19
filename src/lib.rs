//! Library exports for studio-session, shared between the binary and tests.

pub mod client;
pub mod config;
pub mod guard;
pub mod models;
pub mod session;
pub mod startup;
pub mod state;
pub mod storage;
pub mod ui;
pub mod utils;
