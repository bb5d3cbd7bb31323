// Public modules
pub mod advisor;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod render;
pub mod transcript;
pub mod types;
pub mod utils;

mod observability;
mod sse;

// Re-exports
pub use advisor::{Advisor, FragmentStream, StreamingClient, fragments};
pub use client::{API_KEY_ENV, API_KEY_FALLBACK_ENV, ChunkStream, Gemini};
pub use client_logger::ClientLogger;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use transcript::{ChatMessage, MessageId, MessageState, Transcript};
pub use types::*;
