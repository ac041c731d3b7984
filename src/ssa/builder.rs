//! Incremental CFG construction.
//!
//! IR construction proper (schema reflection, lowering of field visitors)
//! lives outside this crate; `CfgBuilder` is the narrow interface it uses to
//! hand a routine over. The first block created is the entry block.
//!
//! ```
//! use jitenc::ssa::{CfgBuilder, Kind};
//!
//! let mut b = CfgBuilder::new();
//! let entry = b.create_block();
//! let r1 = b.const_int(entry, 5);
//! let _r2 = b.binary(entry, jitenc::ssa::IrBinaryOp::Add, r1, r1);
//! b.ret(entry, vec![r1]);
//! let cfg = b.finish().unwrap();
//! assert_eq!(cfg.block(entry).ins.len(), 2);
//! ```

use super::cfg::{BasicBlock, BlockId, Cfg};
use super::ir::{
    CallHandle, IrBinaryExpr, IrBinaryOp, IrBranch, IrCallGeneric, IrConstInt, IrEmit, IrJump,
    IrLoadArg, IrNode, IrPhi, IrReturn, IrSwitch, IrTerminator,
};
use super::reg::{Kind, Reg};
use crate::core::error::{CompileError, CompileResult};

#[derive(Default)]
struct PendingBlock {
    phi: Vec<IrPhi>,
    ins: Vec<Box<dyn IrNode>>,
    term: Option<Box<dyn IrTerminator>>,
}

/// Builder for [`Cfg`].
#[derive(Default)]
pub struct CfgBuilder {
    blocks: Vec<PendingBlock>,
    next_reg: u32,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an empty block.
    pub fn create_block(&mut self) -> BlockId {
        self.blocks.push(PendingBlock::default());
        BlockId(self.blocks.len() as u32 - 1)
    }

    /// Allocate a fresh register.
    pub fn create_register(&mut self, kind: Kind) -> Reg {
        let r = Reg::new(kind, self.next_reg);
        self.next_reg += 1;
        r
    }

    fn pending(&mut self, block: BlockId) -> &mut PendingBlock {
        &mut self.blocks[block.index()]
    }

    /// Append a PHI node to the block's prologue.
    pub fn phi(&mut self, block: BlockId, r: Reg, incoming: Vec<(BlockId, Reg)>) {
        self.pending(block).phi.push(IrPhi::new(r, incoming));
    }

    /// Append an arbitrary instruction.
    pub fn push<N: IrNode>(&mut self, block: BlockId, node: N) {
        self.pending(block).ins.push(Box::new(node));
    }

    /// Set the block's terminator, replacing any previous one.
    pub fn terminate<T: IrTerminator>(&mut self, block: BlockId, term: T) {
        self.pending(block).term = Some(Box::new(term));
    }

    pub fn const_int(&mut self, block: BlockId, v: u64) -> Reg {
        let r = self.create_register(Kind::Norm);
        self.push(block, IrConstInt { r, v });
        r
    }

    pub fn load_arg(&mut self, block: BlockId, kind: Kind, id: usize) -> Reg {
        let r = self.create_register(kind);
        self.push(block, IrLoadArg { r, id });
        r
    }

    pub fn binary(&mut self, block: BlockId, op: IrBinaryOp, x: Reg, y: Reg) -> Reg {
        let r = self.create_register(Kind::Norm);
        self.push(block, IrBinaryExpr { r, x, y, op });
        r
    }

    pub fn emit(&mut self, block: BlockId, v: Reg, width: u8) {
        self.push(block, IrEmit { v, width });
    }

    /// Emit a generic call producing `nrets` scalar results.
    pub fn call(
        &mut self,
        block: BlockId,
        func: CallHandle,
        args: Vec<Reg>,
        nrets: usize,
    ) -> Vec<Reg> {
        let rets: Vec<Reg> = (0..nrets).map(|_| self.create_register(Kind::Norm)).collect();
        self.push(
            block,
            IrCallGeneric {
                func,
                args,
                rets: rets.clone(),
            },
        );
        rets
    }

    pub fn ret(&mut self, block: BlockId, values: Vec<Reg>) {
        self.terminate(block, IrReturn { r: values });
    }

    pub fn jump(&mut self, block: BlockId, to: BlockId) {
        self.terminate(block, IrJump { to });
    }

    pub fn branch(&mut self, block: BlockId, cond: Reg, to: BlockId, otherwise: BlockId) {
        self.terminate(block, IrBranch { cond, to, otherwise });
    }

    pub fn switch(&mut self, block: BlockId, v: Reg, targets: Vec<BlockId>, default: BlockId) {
        self.terminate(block, IrSwitch { v, targets, default });
    }

    /// Finish the graph.
    ///
    /// Fails if the graph is empty, a block lacks a terminator, or an edge or
    /// PHI incoming entry names a block that was never created.
    pub fn finish(self) -> CompileResult<Cfg> {
        if self.blocks.is_empty() {
            return Err(CompileError::EmptyGraph);
        }

        let count = self.blocks.len();
        let mut blocks = Vec::with_capacity(count);
        for (idx, pending) in self.blocks.into_iter().enumerate() {
            let id = BlockId(idx as u32);
            let term = pending
                .term
                .ok_or(CompileError::MissingTerminator { block: id })?;

            let known = |target: BlockId| {
                if target.index() < count {
                    Ok(())
                } else {
                    Err(CompileError::UnknownBlock { from: id, target })
                }
            };
            for succ in term.successors() {
                known(succ)?;
            }
            for phi in &pending.phi {
                for &(pred, _) in &phi.v {
                    known(pred)?;
                }
            }

            blocks.push(BasicBlock {
                id,
                phi: pending.phi,
                ins: pending.ins,
                term,
            });
        }

        log::trace!("cfg: built {} blocks, {} registers", blocks.len(), self.next_reg);
        Ok(Cfg::from_parts(blocks, BlockId(0), self.next_reg))
    }
}
