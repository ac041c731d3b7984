// This module implements the control-flow graph consumed by the SSA passes. A Cfg owns its
// basic blocks in an arena indexed by BlockId, remembers the entry block, and hands out
// fresh registers. Each BasicBlock is an ordered PHI prologue, an ordered instruction list
// and exactly one terminator whose successors define the graph's edges. Passes walk the
// graph in post-order: every block reachable from the entry is visited exactly once, and
// strictly after all of its successors except along back edges. Unreachable blocks stay in
// the arena but are never visited. Blocks are only created through CfgBuilder, which
// guarantees that every block is terminated and every edge names an existing block.

//! SSA control-flow graph.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::ir::{IrNode, IrPhi, IrTerminator};
use super::reg::{Kind, Reg};

/// Index of a block within its [`Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A basic block: PHI prologue, straight-line body, one terminator.
pub struct BasicBlock {
    pub id: BlockId,
    pub phi: Vec<IrPhi>,
    pub ins: Vec<Box<dyn IrNode>>,
    pub term: Box<dyn IrTerminator>,
}

impl BasicBlock {
    /// Successor blocks as reported by the terminator.
    pub fn successors(&self) -> Vec<BlockId> {
        self.term.successors()
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.id)?;
        for phi in &self.phi {
            writeln!(f, "    {}", phi)?;
        }
        for ins in &self.ins {
            writeln!(f, "    {}", ins)?;
        }
        writeln!(f, "    {}", self.term)
    }
}

impl fmt::Debug for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Control-flow graph of one routine.
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    next_reg: u32,
}

impl Cfg {
    pub(crate) fn from_parts(blocks: Vec<BasicBlock>, entry: BlockId, next_reg: u32) -> Self {
        Self {
            blocks,
            entry,
            next_reg,
        }
    }

    #[inline]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Number of blocks, reachable or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id.index()]
    }

    /// All blocks in id order.
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Allocate a fresh register of the given kind.
    pub fn create_register(&mut self, kind: Kind) -> Reg {
        let r = Reg::new(kind, self.next_reg);
        self.next_reg += 1;
        r
    }

    /// Block ids reachable from the entry, each after all of its successors.
    ///
    /// Successor ids outside the graph are not followed.
    pub fn post_order_ids(&self) -> Vec<BlockId> {
        let mut post = Vec::with_capacity(self.blocks.len());
        let mut visited = vec![false; self.blocks.len()];
        let mut stack = vec![(self.entry, false)];

        while let Some((block, processed)) = stack.pop() {
            if processed {
                post.push(block);
                continue;
            }
            if visited[block.index()] {
                continue;
            }
            visited[block.index()] = true;
            stack.push((block, true));
            // Out-of-range targets are left for the consumer to report.
            for succ in self.block(block).successors() {
                if visited.get(succ.index()) == Some(&false) {
                    stack.push((succ, false));
                }
            }
        }

        post
    }

    /// Reachable block ids with the entry first.
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut order = self.post_order_ids();
        order.reverse();
        order
    }

    /// Visit every reachable block in post-order.
    pub fn post_order<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut BasicBlock),
    {
        for id in self.post_order_ids() {
            f(&mut self.blocks[id.index()]);
        }
    }

    /// Predecessors of every reachable block, in post-order of the source.
    pub fn predecessors(&self) -> HashMap<BlockId, Vec<BlockId>> {
        let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        for id in self.post_order_ids() {
            preds.entry(id).or_default();
            let mut seen = HashSet::new();
            for succ in self.block(id).successors() {
                if seen.insert(succ) {
                    preds.entry(succ).or_default().push(id);
                }
            }
        }
        preds
    }

    /// Number of PHI nodes and instructions in reachable blocks.
    pub fn node_count(&self) -> usize {
        self.post_order_ids()
            .into_iter()
            .map(|id| {
                let bb = self.block(id);
                bb.phi.len() + bb.ins.len()
            })
            .sum()
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bb in &self.blocks {
            write!(f, "{}", bb)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::{CfgBuilder, IrBinaryOp, IrJump};

    /// bb0 -> bb1 | bb2, both -> bb3, bb3 -> bb1 | bb4.
    fn diamond_with_loop() -> Cfg {
        diamond(true)
    }

    fn diamond(looping: bool) -> Cfg {
        let mut b = CfgBuilder::new();
        let bb0 = b.create_block();
        let bb1 = b.create_block();
        let bb2 = b.create_block();
        let bb3 = b.create_block();
        let bb4 = b.create_block();

        let c = b.const_int(bb0, 1);
        b.branch(bb0, c, bb1, bb2);
        b.jump(bb1, bb3);
        b.jump(bb2, bb3);
        let d = b.binary(bb3, IrBinaryOp::Sub, c, c);
        if looping {
            b.branch(bb3, d, bb1, bb4);
        } else {
            b.branch(bb3, d, bb4, bb4);
        }
        b.ret(bb4, vec![]);
        b.finish().unwrap()
    }

    #[test]
    fn test_post_order_visits_successors_first() {
        let cfg = diamond(false);
        let order = cfg.post_order_ids();
        assert_eq!(order.len(), 5);

        let pos: HashMap<BlockId, usize> = order.iter().enumerate().map(|(i, b)| (*b, i)).collect();
        assert_eq!(*order.last().unwrap(), cfg.entry());
        for (from, to) in [(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)] {
            assert!(pos[&BlockId(to)] < pos[&BlockId(from)], "bb{to} before bb{from}");
        }
    }

    #[test]
    fn test_post_order_with_back_edge() {
        let cfg = diamond_with_loop();
        let order = cfg.post_order_ids();

        let unique: HashSet<BlockId> = order.iter().copied().collect();
        assert_eq!(order.len(), 5);
        assert_eq!(unique.len(), 5, "each block visited once");
        assert_eq!(*order.last().unwrap(), cfg.entry());
        assert_eq!(order[0], BlockId(4));
    }

    #[test]
    fn test_unreachable_blocks_are_skipped() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let dead = b.create_block();
        b.ret(entry, vec![]);
        b.jump(dead, entry);
        let mut cfg = b.finish().unwrap();

        assert_eq!(cfg.post_order_ids(), vec![entry]);
        let mut visited = Vec::new();
        cfg.post_order(|bb| visited.push(bb.id));
        assert_eq!(visited, vec![entry]);
        assert_eq!(cfg.len(), 2);
    }

    #[test]
    fn test_out_of_range_successor_is_not_followed() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let exit = b.create_block();
        b.jump(entry, exit);
        b.ret(exit, vec![]);
        let mut cfg = b.finish().unwrap();

        cfg.block_mut(exit).term = Box::new(IrJump { to: BlockId(9) });
        assert_eq!(cfg.post_order_ids(), vec![exit, entry]);
        assert_eq!(cfg.node_count(), 0);
    }

    #[test]
    fn test_predecessors() {
        let cfg = diamond_with_loop();
        let preds = cfg.predecessors();

        assert!(preds[&BlockId(0)].is_empty());
        let mut bb1 = preds[&BlockId(1)].clone();
        bb1.sort();
        assert_eq!(bb1, vec![BlockId(0), BlockId(3)]);
        assert_eq!(preds[&BlockId(3)].len(), 2);
        assert_eq!(cfg.reverse_post_order()[0], BlockId(0));
    }

    #[test]
    fn test_display_lists_every_node() {
        let cfg = diamond_with_loop();
        let text = cfg.to_string();
        assert!(text.contains("bb0:\n    %r0 = const 1\n    br %r0, bb1, bb2\n"));
        assert!(text.contains("%r1 = sub %r0, %r0"));
        assert_eq!(cfg.node_count(), 2);
    }
}
