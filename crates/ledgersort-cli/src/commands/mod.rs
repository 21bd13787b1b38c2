//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `categorize` - Full pipeline over a transaction file
//! - `core` - Shared utilities (config overrides, dictionary loading)
//! - `health` - Model backend check
//! - `matching` - Normalize and match inspection commands
//! - `prompts` - Prompt library management commands

pub mod categorize;
pub mod core;
pub mod health;
pub mod matching;
pub mod prompts;

// Re-export command functions for main.rs
pub use categorize::*;
pub use core::*;
pub use health::*;
pub use matching::*;
pub use prompts::*;
