//! Shared fixtures for the integration tests: a fake OpenRouter upstream and
//! a handle on a spawned server process.

pub mod server;
pub mod upstream;

pub use server::ServerProcess;
pub use upstream::{completion_body, FakeOpenRouter};
