pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod retry;
pub mod state;
pub mod validation;

pub use app::build_router;
pub use retry::{RetryPolicy, Retryable, RetryableOperation, with_retry};
