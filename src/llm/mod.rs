//! Completion service integration
//!
//! This module provides the transport for the chat completion API together
//! with the retry and follow-up policy built on top of it.

pub mod client;
pub mod errors;
pub mod openai;
pub mod provider;
pub mod types;

pub use errors::*;
pub use provider::*;
pub use types::*;
