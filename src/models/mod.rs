pub mod auth;
pub mod token;
pub mod user;

pub use auth::{AuthResponse, LoginRequest, SignupRequest, TokenResponse};
pub use token::AuthToken;
pub use user::User;
