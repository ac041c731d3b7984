// This module assembles an optimised CFG into a Program, the backend-neutral form both
// linkers consume. Assembly walks the blocks reachable from the entry and lowers each IR
// node to a small operation enum whose operands are frame slots. Every non-zero register
// that some node defines gets its own one-word slot; reads of the zero sentinel become the
// constant 0 and writes to it are discarded. The frame layout is described by a stack map
// with one bit per slot (set for Ptr registers), built and pinned during assembly so the
// resulting encoders can refer to it by raw handle. Assembly rejects graphs the backends
// cannot run: unknown blocks, PHI incoming edges that are not predecessors, PHI nodes on
// the entry block, undefined registers, unsupported emit widths, unknown generic calls and
// calls whose arity does not match the registry. A PHI that lacks an incoming value for an
// edge actually taken is a runtime error, raised the same way by every backend.

//! Backend-neutral encoder programs.

use std::collections::HashMap;
use std::sync::Arc;

use super::gcall::{self, CallDesc};
use crate::core::error::{CompileError, CompileResult};
use crate::rt::{StackMap, StackMapBuilder};
use crate::ssa::{
    BlockId, CallHandle, Cfg, IrBinaryExpr, IrBinaryOp, IrBranch, IrCallGeneric, IrConstInt,
    IrEmit, IrJump, IrLoadArg, IrNode, IrReturn, IrSwitch, IrTerminator, Reg,
};

/// A value read by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// The zero sentinel; always reads 0.
    Zero,
    Slot(usize),
}

impl Operand {
    #[inline]
    pub fn read(self, frame: &[u64]) -> u64 {
        match self {
            Operand::Zero => 0,
            Operand::Slot(i) => frame[i],
        }
    }
}

/// Destination slot; `None` discards the value.
pub type Dest = Option<usize>;

#[inline]
pub fn write(frame: &mut [u64], dst: Dest, v: u64) {
    if let Some(i) = dst {
        frame[i] = v;
    }
}

/// One lowered instruction.
#[derive(Debug, Clone)]
pub enum Op {
    Const {
        dst: Dest,
        v: u64,
    },
    Arg {
        dst: Dest,
        index: usize,
    },
    Binary {
        dst: Dest,
        op: IrBinaryOp,
        x: Operand,
        y: Operand,
    },
    Emit {
        v: Operand,
        width: u8,
    },
    Call {
        func: CallHandle,
        desc: &'static CallDesc,
        args: Vec<Operand>,
        rets: Vec<Dest>,
    },
}

/// A lowered terminator.
#[derive(Debug, Clone)]
pub enum Term {
    Return(Vec<Operand>),
    Jump(BlockId),
    Branch {
        cond: Operand,
        to: BlockId,
        otherwise: BlockId,
    },
    Switch {
        v: Operand,
        targets: Vec<BlockId>,
        default: BlockId,
    },
}

impl Term {
    /// Block taken for the given scrutinee value.
    #[inline]
    pub fn target(&self, frame: &[u64]) -> Option<BlockId> {
        match self {
            Term::Return(_) => None,
            Term::Jump(to) => Some(*to),
            Term::Branch {
                cond,
                to,
                otherwise,
            } => Some(if cond.read(frame) != 0 { *to } else { *otherwise }),
            Term::Switch {
                v,
                targets,
                default,
            } => {
                let i = v.read(frame);
                Some(
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| targets.get(i))
                        .copied()
                        .unwrap_or(*default),
                )
            }
        }
    }

    /// Values produced by a `ret`; empty for every other terminator.
    pub fn return_values(&self, frame: &[u64]) -> Vec<u64> {
        match self {
            Term::Return(vals) => vals.iter().map(|v| v.read(frame)).collect(),
            _ => Vec::new(),
        }
    }
}

/// A lowered PHI node.
#[derive(Debug, Clone)]
pub struct PhiMove {
    pub dst: Dest,
    pub incoming: Vec<(BlockId, Operand)>,
}

/// A lowered basic block.
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub phis: Vec<PhiMove>,
    pub ops: Vec<Op>,
    pub term: Term,
}

#[derive(Debug)]
struct ProgramInner {
    /// Indexed by block id; unreachable blocks are `None`.
    blocks: Vec<Option<Block>>,
    entry: BlockId,
    slots: HashMap<Reg, usize>,
    arg_count: usize,
    stack_map: Arc<StackMap>,
    stack_map_handle: usize,
}

/// An assembled encoder program. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Program {
    inner: Arc<ProgramInner>,
}

impl Program {
    /// Assemble an optimised CFG.
    pub fn assemble(cfg: &Cfg) -> CompileResult<Program> {
        let order = cfg.reverse_post_order();
        let preds = cfg.predecessors();

        let entry = cfg.block(cfg.entry());
        if let Some(phi) = entry.phi.first() {
            return Err(CompileError::EntryPhi {
                block: entry.id,
                reg: phi.r,
            });
        }

        // Slots are handed out in definition order along the reverse post-order.
        let mut slots: HashMap<Reg, usize> = HashMap::new();
        let mut layout: Vec<Reg> = Vec::new();
        let mut define = |r: Reg| -> CompileResult<()> {
            if r.is_zero() {
                return Ok(());
            }
            if slots.insert(r, layout.len()).is_some() {
                return Err(CompileError::DuplicateDefinition { reg: r });
            }
            layout.push(r);
            Ok(())
        };
        for &id in &order {
            let bb = cfg.block(id);
            for phi in &bb.phi {
                define(phi.r)?;
            }
            for ins in &bb.ins {
                for r in node_definitions(id, ins.as_ref())? {
                    define(r)?;
                }
            }
        }

        let mut lower = Lowering {
            slots: &slots,
            arg_count: 0,
        };
        let mut blocks: Vec<Option<Block>> = (0..cfg.len()).map(|_| None).collect();
        for &id in &order {
            let bb = cfg.block(id);
            let empty = Vec::new();
            let bb_preds = preds.get(&id).unwrap_or(&empty);

            let mut phis = Vec::with_capacity(bb.phi.len());
            for phi in &bb.phi {
                let mut incoming = Vec::with_capacity(phi.v.len());
                for &(pred, r) in &phi.v {
                    if pred.index() >= cfg.len() {
                        return Err(CompileError::UnknownBlock {
                            from: id,
                            target: pred,
                        });
                    }
                    if !bb_preds.contains(&pred) {
                        return Err(CompileError::InvalidPhi {
                            block: id,
                            reg: phi.r,
                            pred,
                        });
                    }
                    incoming.push((pred, lower.operand(id, r)?));
                }
                phis.push(PhiMove {
                    dst: lower.dest(phi.r),
                    incoming,
                });
            }

            let mut ops = Vec::with_capacity(bb.ins.len());
            for ins in &bb.ins {
                ops.push(lower.op(id, ins.as_ref())?);
            }
            let term = lower.term(id, bb.term.as_ref(), cfg.len())?;

            blocks[id.index()] = Some(Block {
                id,
                phis,
                ops,
                term,
            });
        }

        let mut builder = StackMapBuilder::new();
        for r in &layout {
            builder.add_field(r.is_pointer());
        }
        let stack_map = builder.build();
        let stack_map_handle = stack_map.pin();

        let arg_count = lower.arg_count;
        log::debug!(
            "program: assembled {} blocks, {} frame words, {} args, stack map {:#x}",
            order.len(),
            layout.len(),
            arg_count,
            stack_map_handle
        );

        Ok(Program {
            inner: Arc::new(ProgramInner {
                blocks,
                entry: cfg.entry(),
                slots,
                arg_count,
                stack_map,
                stack_map_handle,
            }),
        })
    }

    /// Reachable blocks in id order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.inner.blocks.iter().flatten()
    }

    /// Look up a reachable block.
    #[inline]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.inner.blocks.get(id.index()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn entry(&self) -> BlockId {
        self.inner.entry
    }

    /// Frame slot holding `reg`, if it survived optimisation.
    pub fn slot_of(&self, reg: Reg) -> Option<usize> {
        self.inner.slots.get(&reg).copied()
    }

    /// Frame size in words.
    pub fn frame_size(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of argument words the program reads.
    pub fn arg_count(&self) -> usize {
        self.inner.arg_count
    }

    /// Pinned stack map handle describing the frame.
    pub fn stack_map(&self) -> usize {
        self.inner.stack_map_handle
    }

    /// The frame stack map itself.
    pub fn frame_map(&self) -> &Arc<StackMap> {
        &self.inner.stack_map
    }
}

fn unsupported(block: BlockId, node: &dyn IrNode) -> CompileError {
    CompileError::UnsupportedNode {
        block,
        node: node.to_string(),
    }
}

/// Registers a supported instruction defines.
fn node_definitions(block: BlockId, node: &dyn IrNode) -> CompileResult<Vec<Reg>> {
    let any = node.as_any();
    if let Some(n) = any.downcast_ref::<IrConstInt>() {
        Ok(vec![n.r])
    } else if let Some(n) = any.downcast_ref::<IrLoadArg>() {
        Ok(vec![n.r])
    } else if let Some(n) = any.downcast_ref::<IrBinaryExpr>() {
        Ok(vec![n.r])
    } else if any.is::<IrEmit>() {
        Ok(Vec::new())
    } else if let Some(n) = any.downcast_ref::<IrCallGeneric>() {
        Ok(n.rets.clone())
    } else {
        Err(unsupported(block, node))
    }
}

struct Lowering<'a> {
    slots: &'a HashMap<Reg, usize>,
    arg_count: usize,
}

impl Lowering<'_> {
    fn operand(&self, block: BlockId, r: Reg) -> CompileResult<Operand> {
        if r.is_zero() {
            return Ok(Operand::Zero);
        }
        self.slots
            .get(&r)
            .map(|&i| Operand::Slot(i))
            .ok_or(CompileError::UndefinedRegister { block, reg: r })
    }

    fn operands(&self, block: BlockId, regs: &[Reg]) -> CompileResult<Vec<Operand>> {
        regs.iter().map(|&r| self.operand(block, r)).collect()
    }

    fn dest(&self, r: Reg) -> Dest {
        self.slots.get(&r).copied()
    }

    fn op(&mut self, block: BlockId, node: &dyn IrNode) -> CompileResult<Op> {
        let any = node.as_any();
        if let Some(n) = any.downcast_ref::<IrConstInt>() {
            Ok(Op::Const {
                dst: self.dest(n.r),
                v: n.v,
            })
        } else if let Some(n) = any.downcast_ref::<IrLoadArg>() {
            self.arg_count = self.arg_count.max(n.id + 1);
            Ok(Op::Arg {
                dst: self.dest(n.r),
                index: n.id,
            })
        } else if let Some(n) = any.downcast_ref::<IrBinaryExpr>() {
            Ok(Op::Binary {
                dst: self.dest(n.r),
                op: n.op,
                x: self.operand(block, n.x)?,
                y: self.operand(block, n.y)?,
            })
        } else if let Some(n) = any.downcast_ref::<IrEmit>() {
            if !matches!(n.width, 1 | 2 | 4 | 8) {
                return Err(CompileError::InvalidWidth { width: n.width });
            }
            Ok(Op::Emit {
                v: self.operand(block, n.v)?,
                width: n.width,
            })
        } else if let Some(n) = any.downcast_ref::<IrCallGeneric>() {
            let desc = gcall::lookup(n.func).ok_or_else(|| unsupported(block, node))?;
            if n.args.len() != desc.args {
                return Err(CompileError::CallArity {
                    name: desc.name,
                    what: "arguments",
                    expected: desc.args,
                    got: n.args.len(),
                });
            }
            if n.rets.len() > desc.rets {
                return Err(CompileError::CallArity {
                    name: desc.name,
                    what: "results",
                    expected: desc.rets,
                    got: n.rets.len(),
                });
            }
            Ok(Op::Call {
                func: n.func,
                desc,
                args: self.operands(block, &n.args)?,
                rets: n.rets.iter().map(|&r| self.dest(r)).collect(),
            })
        } else {
            Err(unsupported(block, node))
        }
    }

    fn term(&self, block: BlockId, node: &dyn IrTerminator, nblocks: usize) -> CompileResult<Term> {
        for succ in node.successors() {
            if succ.index() >= nblocks {
                return Err(CompileError::UnknownBlock {
                    from: block,
                    target: succ,
                });
            }
        }

        let any = node.as_any();
        if let Some(n) = any.downcast_ref::<IrReturn>() {
            Ok(Term::Return(self.operands(block, &n.r)?))
        } else if let Some(n) = any.downcast_ref::<IrJump>() {
            Ok(Term::Jump(n.to))
        } else if let Some(n) = any.downcast_ref::<IrBranch>() {
            Ok(Term::Branch {
                cond: self.operand(block, n.cond)?,
                to: n.to,
                otherwise: n.otherwise,
            })
        } else if let Some(n) = any.downcast_ref::<IrSwitch>() {
            Ok(Term::Switch {
                v: self.operand(block, n.v)?,
                targets: n.targets.clone(),
                default: n.default,
            })
        } else {
            Err(CompileError::UnsupportedNode {
                block,
                node: node.to_string(),
            })
        }
    }
}
