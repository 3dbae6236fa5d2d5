//! HTTP service, completion proxy and data tooling for the ideation study.

pub mod api;
pub mod completion;
pub mod config;
pub mod error;
pub mod export;
pub mod import;

pub use api::AppState;
pub use api::router;
pub use completion::CompletionClient;
pub use config::ServiceConfig;
pub use error::ApiError;
