//! Code extraction and bounded execution
//!
//! Model replies carry fenced code blocks; this module pulls them out,
//! runs them inside a per-session namespace, and turns what they print
//! into the answer text.

pub mod extract;
pub mod namespace;
pub mod runner;

pub use extract::extract_code_blocks;
pub use namespace::ExecNamespace;
pub use runner::{CodeCorrector, CodeRunner, ExecError, ExecutionResult};
