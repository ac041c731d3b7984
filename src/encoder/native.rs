// This module implements the native linker. Instead of interpreting the program on every
// call, linking compiles each instruction into a boxed closure that captures its operands,
// constants and resolved generic-call entry, and precomputes the PHI copies of every
// control edge so taking an edge is a plain parallel copy. An edge whose target has a PHI
// without an incoming value for it is compiled into the PhiMismatch error it raises when
// taken, which keeps observable behavior identical to the interpreter. Generic calls use
// their native entries.

//! Closure-compiled encoders.

use std::collections::HashMap;
use std::sync::Arc;

use super::linker::Linker;
use super::program::{write, Block, Dest, Op, Operand, Program, Term};
use super::{emit_bytes, load_arg, Backend, EncodeError, EncodeResult, Encoder};
use crate::ssa::BlockId;

/// Mutable state of one encoder call.
struct Frame<'a> {
    slots: Vec<u64>,
    args: &'a [u64],
    buf: &'a mut Vec<u8>,
}

type OpFn = Box<dyn Fn(&mut Frame<'_>) -> EncodeResult<()> + Send + Sync>;

/// PHI copies for one edge, or the error taking it raises.
type EdgeMoves = EncodeResult<Vec<(Dest, Operand)>>;

struct CompiledBlock {
    ops: Vec<OpFn>,
    term: Term,
    edges: HashMap<BlockId, EdgeMoves>,
}

struct Compiled {
    /// Indexed by block id.
    blocks: Vec<Option<CompiledBlock>>,
    entry: BlockId,
    frame_size: usize,
}

/// Linker producing closure-compiled encoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLinker;

impl NativeLinker {
    pub fn new() -> Self {
        Self
    }
}

impl Linker for NativeLinker {
    fn link(&self, p: &Program) -> Encoder {
        let compiled = Arc::new(compile(p));
        log::debug!(
            "native: compiled {} blocks, stack map {:#x}",
            compiled.blocks.iter().flatten().count(),
            p.stack_map()
        );
        Encoder::new(Backend::Native, p.stack_map(), move |args, buf| {
            compiled.run(args, buf)
        })
    }
}

fn compile(p: &Program) -> Compiled {
    let mut blocks: Vec<Option<CompiledBlock>> = Vec::new();
    for block in p.blocks() {
        let idx = block.id.index();
        if blocks.len() <= idx {
            blocks.resize_with(idx + 1, || None);
        }

        let mut edges = HashMap::new();
        let succs: Vec<BlockId> = match &block.term {
            Term::Return(_) => Vec::new(),
            Term::Jump(to) => vec![*to],
            Term::Branch { to, otherwise, .. } => vec![*to, *otherwise],
            Term::Switch {
                targets, default, ..
            } => targets.iter().copied().chain(std::iter::once(*default)).collect(),
        };
        for succ in succs {
            if let Some(target) = p.block(succ) {
                edges.entry(succ).or_insert_with(|| edge_moves(block.id, target));
            }
        }

        blocks[idx] = Some(CompiledBlock {
            ops: block.ops.iter().map(compile_op).collect(),
            term: block.term.clone(),
            edges,
        });
    }

    Compiled {
        blocks,
        entry: p.entry(),
        frame_size: p.frame_size(),
    }
}

fn edge_moves(from: BlockId, target: &Block) -> EdgeMoves {
    target
        .phis
        .iter()
        .map(|phi| {
            phi.incoming
                .iter()
                .find(|(b, _)| *b == from)
                .map(|&(_, src)| (phi.dst, src))
                .ok_or(EncodeError::PhiMismatch {
                    block: target.id,
                    pred: from,
                })
        })
        .collect()
}

fn op_fn<F>(f: F) -> OpFn
where
    F: Fn(&mut Frame<'_>) -> EncodeResult<()> + Send + Sync + 'static,
{
    Box::new(f)
}

fn compile_op(op: &Op) -> OpFn {
    match op.clone() {
        Op::Const { dst: None, .. } => op_fn(|_| Ok(())),
        Op::Const { dst: Some(i), v } => op_fn(move |f| {
            f.slots[i] = v;
            Ok(())
        }),
        Op::Arg { dst, index } => op_fn(move |f| {
            let v = load_arg(f.args, index)?;
            write(&mut f.slots, dst, v);
            Ok(())
        }),
        Op::Binary { dst, op, x, y } => op_fn(move |f| {
            let v = op.eval(x.read(&f.slots), y.read(&f.slots));
            write(&mut f.slots, dst, v);
            Ok(())
        }),
        Op::Emit { v, width } => op_fn(move |f| {
            let v = v.read(&f.slots);
            emit_bytes(f.buf, v, width);
            Ok(())
        }),
        Op::Call {
            desc, args, rets, ..
        } => {
            let entry = desc.native;
            op_fn(move |f| {
                let argv: Vec<u64> = args.iter().map(|a| a.read(&f.slots)).collect();
                let mut retv = vec![0u64; rets.len()];
                entry(f.buf, &argv, &mut retv);
                for (dst, v) in rets.iter().zip(retv) {
                    write(&mut f.slots, *dst, v);
                }
                Ok(())
            })
        }
    }
}

impl Compiled {
    fn run(&self, args: &[u64], buf: &mut Vec<u8>) -> EncodeResult<Vec<u64>> {
        let mut frame = Frame {
            slots: vec![0u64; self.frame_size],
            args,
            buf,
        };
        let mut cur = self.entry;

        loop {
            let Some(block) = self.blocks.get(cur.index()).and_then(Option::as_ref) else {
                unreachable!("native: control reached uncompiled block {cur}");
            };
            for op in &block.ops {
                op(&mut frame)?;
            }

            let Some(next) = block.term.target(&frame.slots) else {
                return Ok(block.term.return_values(&frame.slots));
            };
            if let Some(moves) = block.edges.get(&next) {
                let moves = moves.as_ref().map_err(Clone::clone)?;
                let values: Vec<u64> =
                    moves.iter().map(|(_, src)| src.read(&frame.slots)).collect();
                for ((dst, _), v) in moves.iter().zip(values) {
                    write(&mut frame.slots, *dst, v);
                }
            }
            cur = next;
        }
    }
}
