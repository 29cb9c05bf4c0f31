pub mod bridge;
pub mod card;
pub mod client;
pub mod config;
pub mod orchestrator;
pub mod provider;
pub mod server;
pub mod tools;
pub mod types;

pub use types::*;
