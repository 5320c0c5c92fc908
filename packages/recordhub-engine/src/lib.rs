pub mod auth;
pub mod broadcast;
pub mod cache_adapter;
pub mod engine;
pub mod error;
pub mod filter;

pub use auth::{AllowAll, AuthContext, AuthHook};
pub use broadcast::{Action, Broadcaster, ChangeEvent, Sink};
pub use engine::{Engine, ListQuery, ListResult};
pub use error::EngineError;
