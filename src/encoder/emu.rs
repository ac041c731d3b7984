//! Interpreter-backed encoders.
//!
//! `link_emu` wraps a program in an encoder that walks its lowered blocks on
//! every call. It needs no code generation and serves as the fallback when no
//! linker is installed. Generic calls go through their interpreter
//! trampolines.

use super::gcall::EmuCallContext;
use super::program::{write, Block, Op, Program};
use super::{emit_bytes, load_arg, Backend, EncodeError, EncodeResult, Encoder};
use crate::ssa::BlockId;

/// Build an encoder that interprets `p`.
pub fn link_emu(p: &Program) -> Encoder {
    let program = p.clone();
    log::debug!(
        "emu: linked program with {} frame words, stack map {:#x}",
        program.frame_size(),
        program.stack_map()
    );
    Encoder::new(Backend::Emulated, p.stack_map(), move |args, buf| {
        interpret(&program, args, buf)
    })
}

/// Run `p` once.
pub fn interpret(p: &Program, args: &[u64], buf: &mut Vec<u8>) -> EncodeResult<Vec<u64>> {
    let mut frame = vec![0u64; p.frame_size()];
    let mut pred: Option<BlockId> = None;
    let mut cur = p.entry();

    loop {
        let Some(block) = p.block(cur) else {
            unreachable!("emu: control reached unassembled block {cur}");
        };
        if let Some(from) = pred {
            resolve_phis(block, from, &mut frame)?;
        }
        for op in &block.ops {
            step(op, args, &mut frame, buf)?;
        }

        match block.term.target(&frame) {
            Some(next) => {
                pred = Some(cur);
                cur = next;
            }
            None => return Ok(block.term.return_values(&frame)),
        }
    }
}

/// Evaluate every PHI for the edge `from -> block`, then store the results.
fn resolve_phis(block: &Block, from: BlockId, frame: &mut [u64]) -> EncodeResult<()> {
    if block.phis.is_empty() {
        return Ok(());
    }

    let mut values = Vec::with_capacity(block.phis.len());
    for phi in &block.phis {
        let (_, src) = phi
            .incoming
            .iter()
            .find(|(b, _)| *b == from)
            .ok_or(EncodeError::PhiMismatch {
                block: block.id,
                pred: from,
            })?;
        values.push(src.read(frame));
    }
    for (phi, v) in block.phis.iter().zip(values) {
        write(frame, phi.dst, v);
    }
    Ok(())
}

fn step(op: &Op, args: &[u64], frame: &mut [u64], buf: &mut Vec<u8>) -> EncodeResult<()> {
    match op {
        Op::Const { dst, v } => write(frame, *dst, *v),
        Op::Arg { dst, index } => {
            let v = load_arg(args, *index)?;
            write(frame, *dst, v);
        }
        Op::Binary { dst, op, x, y } => {
            let v = op.eval(x.read(frame), y.read(frame));
            write(frame, *dst, v);
        }
        Op::Emit { v, width } => emit_bytes(buf, v.read(frame), *width),
        Op::Call {
            desc, args: ops, rets, ..
        } => {
            let argv: Vec<u64> = ops.iter().map(|a| a.read(frame)).collect();
            let mut retv = vec![0u64; rets.len()];
            (desc.emu)(&mut EmuCallContext::new(buf, &argv, &mut retv));
            for (dst, v) in rets.iter().zip(retv) {
                write(frame, *dst, v);
            }
        }
    }
    Ok(())
}
