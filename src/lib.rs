//! jitenc - JIT serialization runtime core.
//!
//! jitenc compiles per-type encoder routines expressed as SSA control-flow
//! graphs. Each routine is cleaned up by trivial dead-code elimination,
//! assembled into a frame-slot program whose pointer layout is described by
//! a pinned stack map, and linked either by an installed native linker or
//! by the built-in interpreter.
//!
//! # Primary Usage
//!
//! ```
//! use bumpalo::Bump;
//! use jitenc::core::CompilationSession;
//! use jitenc::encoder::F_ENCODE;
//! use jitenc::ssa::{CfgBuilder, Kind};
//! use jitenc::EncoderCompiler;
//!
//! let arena = Bump::new();
//! let session = CompilationSession::new(&arena);
//!
//! let mut b = CfgBuilder::new();
//! let entry = b.create_block();
//! let v = b.load_arg(entry, Kind::Norm, 0);
//! b.call(entry, F_ENCODE, vec![v], 0);
//! b.ret(entry, vec![]);
//! let mut cfg = b.finish()?;
//!
//! let encoder = EncoderCompiler::new().compile_and_link(&session, "u64", &mut cfg)?;
//! let mut buf = Vec::new();
//! encoder.encode(&[300], &mut buf).unwrap();
//! assert_eq!(buf, [0xac, 0x02]);
//! # Ok::<(), jitenc::core::CompileError>(())
//! ```
//!
//! # Architecture
//!
//! - [`rt`] - Runtime support: bitmaps, stack maps, collector-aware allocation
//! - [`ssa`] - Registers, IR nodes, CFG, and optimisation passes
//! - [`encoder`] - Programs, generic calls, linking and both backends
//! - [`core`] - Shared infrastructure (session, errors)

pub mod compiler;
pub mod core;
pub mod encoder;
pub mod rt;
pub mod ssa;

pub use compiler::EncoderCompiler;
pub use core::{CompilationSession, CompileError, CompileResult, SessionStats};
pub use encoder::{link, set_linker, Backend, EncodeError, Encoder, Linker, Program};
pub use rt::{Bitmap, StackMap, StackMapBuilder};
pub use ssa::{Cfg, CfgBuilder, Tdce};
