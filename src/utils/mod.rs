pub mod logger;
pub mod throttle;
