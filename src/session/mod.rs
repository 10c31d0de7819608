//! Session management and conversation handling
//!
//! This module provides conversation state tracking, the per-session
//! question pipeline, and the registry that owns every live session.

pub mod conversation;
pub mod prompt;
pub mod registry;
pub mod session;

pub use conversation::*;
pub use prompt::*;
pub use registry::*;
pub use session::*;
