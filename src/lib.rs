pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod http;
pub mod leads;
pub mod limiter;
pub mod structured;

pub use error::{GatewayError, ToolError};
pub use gateway::{ChatBackend, DocumentAi, OpenRouterClient};
