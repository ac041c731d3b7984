// This module defines error types for the jitenc compiler core using the thiserror crate
// for idiomatic Rust error handling. CompileError is the main error enum covering the
// failure scenarios found while turning an optimized CFG into a linkable program: blocks
// left without a terminator, control edges or PHI incoming edges naming blocks that do not
// exist, PHI nodes at the entry block, registers read without a definition, registers
// defined twice (broken SSA), emit widths the encoder cannot produce, and generic calls
// invoked with the wrong arity. Each variant carries the offending block/register for
// debugging. The module also provides CompileResult<T> as a convenience alias for
// Result<T, CompileError>.

//! Error types for the jitenc compiler core.

use thiserror::Error;

use crate::ssa::{BlockId, Reg};

/// Main error type for program construction and verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("CFG has no blocks")]
    EmptyGraph,

    #[error("Block {block} has no terminator")]
    MissingTerminator { block: BlockId },

    #[error("Block {from} refers to unknown block {target}")]
    UnknownBlock { from: BlockId, target: BlockId },

    #[error("PHI {reg} in block {block} has an incoming edge from {pred}, which is not a predecessor")]
    InvalidPhi {
        block: BlockId,
        reg: Reg,
        pred: BlockId,
    },

    #[error("Entry block {block} starts with PHI {reg}")]
    EntryPhi { block: BlockId, reg: Reg },

    #[error("Register {reg} is read in block {block} but never defined")]
    UndefinedRegister { block: BlockId, reg: Reg },

    #[error("Register {reg} is defined more than once")]
    DuplicateDefinition { reg: Reg },

    #[error("Unsupported emit width: {width} bytes")]
    InvalidWidth { width: u8 },

    #[error("Generic call `{name}` expects {expected} {what}, got {got}")]
    CallArity {
        name: &'static str,
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Unsupported IR node in block {block}: {node}")]
    UnsupportedNode { block: BlockId, node: String },

    #[error("Register {reg} is defined but never read")]
    UnusedDefinition { reg: Reg },
}

/// Result type alias for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;
