pub mod auth;
pub mod body;
pub mod error;
pub mod handlers;
pub mod request_utils;
pub mod response;
pub mod router;
pub mod server;

pub use auth::{PasswordVerifier, PlaintextVerifier};
pub use error::ApiError;
pub use router::{AppState, Router};
pub use server::Server;
