pub mod auth;
pub mod cookies;
pub mod error;
pub mod handlers;
pub mod http;
pub mod observability;
pub mod router;
pub mod state;
pub mod types;
pub mod user;
pub mod utils;
pub mod workspace;

pub use error::AppError;
pub use state::{AppState, ServerMetadata, build_state};

#[cfg(test)]
pub mod test_support;
