//! Safety assistant: prompt assembly, the generation backend seam, and the
//! gateway that keeps chat answering when the backend does not.

pub mod backend;
pub mod gateway;
pub mod prompt;

pub use backend::{GenerationBackend, OllamaBackend, OllamaConfig};
pub use gateway::{AssistantGateway, EMPTY_REPLY_FALLBACK, UNREACHABLE_FALLBACK};
