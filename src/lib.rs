// Library interface for issue-semsearch

pub mod config;
pub mod embeddings;
pub mod error;
pub mod indexing;
pub mod issues;
pub mod search;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SemSearchError};
