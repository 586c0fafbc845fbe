pub mod config;
pub mod digest;

pub use config::ContextConfig;
pub use digest::{summarize, CategoryCounts, ContextDigest};
