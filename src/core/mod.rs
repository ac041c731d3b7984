// This module is the hub for jitenc's shared infrastructure: compilation sessions (an
// arena borrowed for the lifetime of one compilation plus statistics) and the error types
// used by program assembly and verification. Everything else in the crate (the SSA passes,
// the runtime stack maps, the encoder linker) builds on these two pieces.

//! Core jitenc infrastructure.
//!
//! ## Session Management (`session`)
//! - Arena-based scratch allocation using `bumpalo`
//! - Pass and pinning statistics
//!
//! ## Errors (`error`)
//! - `CompileError` and the `CompileResult` alias

pub mod error;
pub mod session;
pub mod test_utils;

pub use error::{CompileError, CompileResult};
pub use session::{CompilationSession, SessionStats};
