pub mod config;
pub mod exec;
pub mod http;
pub mod llm;
pub mod metrics;
#[cfg(feature = "server")]
pub mod server;
pub mod tools;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Command timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("LLM error: {0}")]
    Llm(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

pub use config::Config;
pub use tools::{create_typed_fn_tool, default_registry, Tool, ToolRegistry, ToolResult};
