// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod model;
pub mod observability;
pub mod render;
pub mod sse;
pub mod types;

// Re-exports
pub use client::Gemini;
pub use error::{Error, Result};
pub use model::{ChatModel, FragmentStream};
pub use observability::register_biometrics;
pub use render::{Renderer, TerminalRenderer};
pub use types::*;
