pub mod cache;
pub mod clients;
pub mod errors;
pub mod middleware;
pub mod types;

pub use cache::QueryCache;
pub use errors::{AppError, AppResult, AuthError, DataAccessError, ErrorCode};
pub use types::*;
