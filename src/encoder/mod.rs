// This module turns assembled programs into callable encoders. An Encoder is a cheap,
// cloneable handle around a shared entry point that takes the argument words and an
// output buffer, runs the program, and returns the values of the terminating `ret`.
// Encoders come from one of two backends: the interpreter fallback (emu), which walks the
// program's blocks at call time, and a native linker that compiles every block into a
// chain of closures at link time. Both raise the same EncodeError for the same input.
// Which backend `link` uses is decided by the process-wide linker slot in `linker`.

//! Encoders, linking, and the generic call registry.

pub mod emu;
pub mod gcall;
pub mod linker;
pub mod native;
pub mod program;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ssa::BlockId;

pub use emu::link_emu;
pub use gcall::{CallDesc, EmuCallContext, F_ENCODE};
pub use linker::{link, set_linker, LinkError, Linker};
pub use native::NativeLinker;
pub use program::Program;

/// Runtime failure of an encoder call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Argument {index} requested, but only {count} were passed")]
    MissingArgument { index: usize, count: usize },

    #[error("Block {block} was entered from {pred}, which has no PHI incoming value")]
    PhiMismatch { block: BlockId, pred: BlockId },
}

/// Result type alias for encoder calls.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Which backend produced an encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Native,
    Emulated,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Native => write!(f, "native"),
            Backend::Emulated => write!(f, "emulated"),
        }
    }
}

type EncodeFn = dyn Fn(&[u64], &mut Vec<u8>) -> EncodeResult<Vec<u64>> + Send + Sync;

/// A linked, callable encoder.
#[derive(Clone)]
pub struct Encoder {
    backend: Backend,
    stack_map: usize,
    entry: Arc<EncodeFn>,
}

impl Encoder {
    pub fn new<F>(backend: Backend, stack_map: usize, entry: F) -> Self
    where
        F: Fn(&[u64], &mut Vec<u8>) -> EncodeResult<Vec<u64>> + Send + Sync + 'static,
    {
        Self {
            backend,
            stack_map,
            entry: Arc::new(entry),
        }
    }

    /// Run the encoder, appending its output to `buf`.
    pub fn encode(&self, args: &[u64], buf: &mut Vec<u8>) -> EncodeResult<()> {
        self.call(args, buf).map(|_| ())
    }

    /// Run the encoder and return the values of the final `ret`.
    pub fn call(&self, args: &[u64], buf: &mut Vec<u8>) -> EncodeResult<Vec<u64>> {
        (self.entry)(args, buf)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Pinned stack map handle of the encoder's frame.
    pub fn stack_map(&self) -> usize {
        self.stack_map
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("backend", &self.backend)
            .field("stack_map", &format_args!("{:#x}", self.stack_map))
            .finish()
    }
}

/// Read argument `index`, failing like every backend does.
#[inline]
pub(crate) fn load_arg(args: &[u64], index: usize) -> EncodeResult<u64> {
    args.get(index).copied().ok_or(EncodeError::MissingArgument {
        index,
        count: args.len(),
    })
}

/// Append the low `width` bytes of `v`, little endian.
#[inline]
pub(crate) fn emit_bytes(buf: &mut Vec<u8>, v: u64, width: u8) {
    buf.extend_from_slice(&v.to_le_bytes()[..width as usize]);
}
