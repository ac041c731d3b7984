// This module implements TDCE (trivial dead-code elimination): it removes register
// definitions that nothing reads, repeating until a fixed point. Every round has four
// phases. (1) Walk the CFG in post-order and collect every register declared by a PHI
// node, an instruction or a terminator. (2) Walk again and strike every register that any
// node reads; what remains is defined somewhere but read nowhere. A node reading its own
// result, such as a loop PHI fed by itself along a back edge, keeps that result alive.
// (3) Rewrite each remaining declared register to the zero sentinel in place, one register
// at a time, since a multi-result node may still have live outputs. (4) Compact every
// block: drop PHI nodes and instructions whose declared registers are all zero. Nodes that
// declare nothing or report side effects stay (a generic call whose results are all dead
// still writes its bytes), and the terminator is never touched. Removing a node can make
// its operands dead, so the loop continues until a round rewrites nothing.
// The per-round declaration set is a hashbrown set allocated in the session arena.

//! Trivial dead-code elimination over an SSA CFG.

use bumpalo::Bump;
use hashbrown::{DefaultHashBuilder, HashSet};

use super::cfg::Cfg;
use super::ir::{IrDefinitions, IrUsages};
use super::pass::Pass;
use super::reg::{Kind, Reg};
use crate::core::session::CompilationSession;

type RegSet<'arena> = HashSet<Reg, DefaultHashBuilder, &'arena Bump>;

/// What one TDCE invocation changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TdceStats {
    /// Rounds run, including the final round that changed nothing.
    pub rounds: usize,
    /// Registers rewritten to the zero sentinel.
    pub rewrites: usize,
    /// PHI nodes and instructions dropped.
    pub removed: usize,
}

/// Removes unused register definitions until a fixed point.
#[derive(Debug, Default, Clone, Copy)]
pub struct Tdce;

impl Tdce {
    pub fn new() -> Self {
        Self
    }

    /// Optimise `cfg` in place with a private scratch arena.
    pub fn apply(&self, cfg: &mut Cfg) -> TdceStats {
        let arena = Bump::new();
        let session = CompilationSession::new(&arena);
        self.run_in(&session, cfg)
    }

    /// Optimise `cfg` in place, allocating working sets in the session arena.
    pub fn run_in(&self, session: &CompilationSession<'_>, cfg: &mut Cfg) -> TdceStats {
        let mut stats = TdceStats::default();

        loop {
            let mut decl: RegSet<'_> = HashSet::new_in(session.arena());

            /* Phase 1: mark all the definitions */
            cfg.post_order(|bb| {
                for phi in &mut bb.phi {
                    decl.extend(phi.definitions().into_iter().map(|r| *r));
                }
                for ins in &mut bb.ins {
                    if let Some(defs) = ins.as_definitions() {
                        decl.extend(defs.definitions().into_iter().map(|r| *r));
                    }
                }
                if let Some(defs) = bb.term.as_definitions() {
                    decl.extend(defs.definitions().into_iter().map(|r| *r));
                }
            });

            /* Phase 2: strike every register that is read somewhere */
            cfg.post_order(|bb| {
                for phi in &mut bb.phi {
                    for r in phi.usages() {
                        decl.remove(&*r);
                    }
                }
                for ins in &mut bb.ins {
                    if let Some(uses) = ins.as_usages() {
                        for r in uses.usages() {
                            decl.remove(&*r);
                        }
                    }
                }
                if let Some(uses) = bb.term.as_usages() {
                    for r in uses.usages() {
                        decl.remove(&*r);
                    }
                }
            });

            /* Phase 3: replace unused definitions with the zero register */
            let mut rewrites = 0;
            cfg.post_order(|bb| {
                for phi in &mut bb.phi {
                    rewrites += neutralize(phi.definitions(), &decl);
                }
                for ins in &mut bb.ins {
                    if let Some(defs) = ins.as_definitions() {
                        rewrites += neutralize(defs.definitions(), &decl);
                    }
                }
                if let Some(defs) = bb.term.as_definitions() {
                    rewrites += neutralize(defs.definitions(), &decl);
                }
            });

            /* Phase 4: drop nodes whose definitions are all zero */
            let mut removed = 0;
            cfg.post_order(|bb| {
                let before = bb.phi.len() + bb.ins.len();
                bb.phi.retain_mut(|phi| phi.definitions().iter().any(|r| !r.is_zero()));
                bb.ins.retain_mut(|ins| {
                    if ins.has_side_effects() {
                        return true;
                    }
                    match ins.as_definitions() {
                        None => true,
                        Some(defs) => {
                            let rr = defs.definitions();
                            rr.is_empty() || rr.iter().any(|r| !r.is_zero())
                        }
                    }
                });
                removed += before - (bb.phi.len() + bb.ins.len());
            });

            stats.rounds += 1;
            stats.rewrites += rewrites;
            stats.removed += removed;
            session.record_dce_round(rewrites, removed);
            log::trace!(
                "tdce: round {}: {} rewrites, {} nodes removed",
                stats.rounds,
                rewrites,
                removed
            );

            if rewrites == 0 {
                break;
            }
        }

        log::debug!(
            "tdce: fixed point after {} rounds ({} rewrites, {} nodes removed)",
            stats.rounds,
            stats.rewrites,
            stats.removed
        );
        stats
    }
}

impl Pass for Tdce {
    fn name(&self) -> &'static str {
        "tdce"
    }

    fn run(&self, session: &CompilationSession<'_>, cfg: &mut Cfg) -> bool {
        self.run_in(session, cfg).rewrites != 0
    }
}

/// Zero every non-sentinel register of `defs` that is in `dead`.
fn neutralize(defs: Vec<&mut Reg>, dead: &RegSet<'_>) -> usize {
    let mut n = 0;
    for r in defs {
        if r.kind() != Kind::Zero && dead.contains(&*r) {
            *r = Reg::zero();
            n += 1;
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_utils::test::with_test_context;
    use crate::ssa::{
        BlockId, CallHandle, CfgBuilder, IrBinaryOp, IrCallGeneric, IrConstInt, IrNode,
        IrTerminator,
    };
    use std::collections::HashSet as StdHashSet;

    fn node_strings(cfg: &Cfg, block: BlockId) -> Vec<String> {
        let bb = cfg.block(block);
        bb.phi
            .iter()
            .map(|p| p.to_string())
            .chain(bb.ins.iter().map(|i| i.to_string()))
            .chain(std::iter::once(bb.term.to_string()))
            .collect()
    }

    /// Every non-sentinel definition left in the graph is read somewhere.
    fn assert_sound(cfg: &mut Cfg) {
        let mut defs = Vec::new();
        let mut uses = StdHashSet::new();
        cfg.post_order(|bb| {
            for phi in &mut bb.phi {
                defs.extend(phi.definitions().into_iter().map(|r| *r));
                uses.extend(phi.usages().into_iter().map(|r| *r));
            }
            for ins in bb.ins.iter_mut() {
                defs.extend(crate::ssa::defined_regs(ins.as_mut()));
                uses.extend(crate::ssa::used_regs(ins.as_mut()));
            }
            uses.extend(crate::ssa::used_regs(bb.term.as_mut()));
        });
        for r in defs {
            assert!(r.is_zero() || uses.contains(&r), "{r} defined but never read");
        }
    }

    #[test]
    fn test_scenario_a_unused_add() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let r1 = b.const_int(entry, 5);
        let _r2 = b.binary(entry, IrBinaryOp::Add, r1, r1);
        b.ret(entry, vec![r1]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.rounds, 2);
        assert_eq!(node_strings(&cfg, entry), vec!["%r0 = const 5", "ret %r0"]);

        let again = Tdce::new().apply(&mut cfg);
        assert_eq!(again.rewrites, 0);
        assert_eq!(again.removed, 0);
        assert_eq!(again.rounds, 1);
    }

    #[test]
    fn test_chain_dies_over_several_rounds() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let a = b.const_int(entry, 1);
        let c = b.binary(entry, IrBinaryOp::Add, a, a);
        let d = b.binary(entry, IrBinaryOp::Mul, c, c);
        let _e = b.binary(entry, IrBinaryOp::Sub, d, a);
        b.ret(entry, vec![]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 4);
        assert_eq!(stats.removed, 4);
        assert_eq!(stats.rounds, 5);
        assert!(cfg.block(entry).ins.is_empty());
    }

    #[test]
    fn test_side_effects_and_terminator_survive() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let v = b.load_arg(entry, Kind::Norm, 0);
        b.emit(entry, v, 4);
        b.call(entry, CallHandle(0), vec![v], 0);
        b.ret(entry, vec![]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 0);
        assert_eq!(
            node_strings(&cfg, entry),
            vec!["%r0 = arg 0", "emit.4 %r0", "gcall #0(%r0)", "ret "]
        );
    }

    #[test]
    fn test_multi_result_neutralized_per_register() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let x = b.const_int(entry, 9);
        let rets = b.call(entry, CallHandle(0), vec![x], 2);
        b.ret(entry, vec![rets[1]]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(stats.removed, 0);

        let call = cfg.block(entry).ins[1]
            .as_any()
            .downcast_ref::<IrCallGeneric>()
            .unwrap();
        assert_eq!(call.rets, vec![Reg::zero(), rets[1]]);
        assert_sound(&mut cfg);
    }

    #[test]
    fn test_call_with_all_results_dead_still_runs() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let x = b.const_int(entry, 9);
        b.call(entry, CallHandle(0), vec![x], 1);
        b.ret(entry, vec![]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 1);
        assert_eq!(stats.removed, 0);
        assert_eq!(
            node_strings(&cfg, entry),
            vec!["%r0 = const 9", "%z = gcall #0(%r0)", "ret "]
        );
        assert_sound(&mut cfg);
    }

    /// Terminator that defines a status register, for the terminator rule.
    struct IrRetStatus {
        status: Reg,
    }

    impl IrDefinitions for IrRetStatus {
        fn definitions(&mut self) -> Vec<&mut Reg> {
            vec![&mut self.status]
        }
    }

    impl IrNode for IrRetStatus {
        fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
            Some(self)
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    impl IrTerminator for IrRetStatus {
        fn successors(&self) -> Vec<BlockId> {
            Vec::new()
        }
    }

    impl std::fmt::Display for IrRetStatus {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{} = ret.status", self.status)
        }
    }

    #[test]
    fn test_terminator_definitions_neutralized_but_kept() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let status = b.create_register(Kind::Norm);
        b.const_int(entry, 1);
        b.terminate(entry, IrRetStatus { status });
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(node_strings(&cfg, entry), vec!["%z = ret.status"]);

        let again = Tdce::new().apply(&mut cfg);
        assert_eq!(again.rewrites, 0);
        assert_eq!(node_strings(&cfg, entry), vec!["%z = ret.status"]);
    }

    #[test]
    fn test_scenario_b_phi_nodes() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();

        let c = b.load_arg(entry, Kind::Norm, 0);
        b.branch(entry, c, left, right);
        let l1 = b.const_int(left, 1);
        let l2 = b.const_int(left, 10);
        b.jump(left, join);
        let r1 = b.const_int(right, 2);
        let r2 = b.const_int(right, 20);
        b.jump(right, join);

        let dead = b.create_register(Kind::Norm);
        let live = b.create_register(Kind::Norm);
        b.phi(join, dead, vec![(left, l1), (right, r1)]);
        b.phi(join, live, vec![(left, l2), (right, r2)]);
        b.ret(join, vec![live]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 3, "dead phi plus its two inputs");

        let bb = cfg.block(join);
        assert_eq!(bb.phi.len(), 1);
        assert_eq!(bb.phi[0].r, live);
        assert_eq!(bb.phi[0].v, vec![(left, l2), (right, r2)]);
        assert_eq!(node_strings(&cfg, left), vec!["%r2 = const 10", "jmp bb3"]);
        assert_eq!(node_strings(&cfg, right), vec!["%r4 = const 20", "jmp bb3"]);
        assert_sound(&mut cfg);
    }

    #[test]
    fn test_self_referencing_phi_stays_alive() {
        // bb1 loops on itself; the loop PHI only feeds itself.
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let looping = b.create_block();
        let exit = b.create_block();

        let init = b.const_int(entry, 0);
        let c = b.load_arg(entry, Kind::Norm, 0);
        b.jump(entry, looping);
        let acc = b.create_register(Kind::Norm);
        b.phi(looping, acc, vec![(entry, init), (looping, acc)]);
        b.branch(looping, c, looping, exit);
        b.ret(exit, vec![]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 0);
        assert_eq!(cfg.block(looping).phi.len(), 1);
        assert_eq!(cfg.block(entry).ins.len(), 2);
    }

    #[test]
    fn test_loop_carried_value_feeding_return_is_live() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let body = b.create_block();
        let exit = b.create_block();

        let zero = b.const_int(entry, 0);
        let one = b.const_int(entry, 1);
        b.jump(entry, body);
        let i = b.create_register(Kind::Norm);
        let scratch = b.create_register(Kind::Norm);
        let next = b.create_register(Kind::Norm);
        b.phi(body, i, vec![(entry, zero), (body, next)]);
        b.phi(body, scratch, vec![(entry, zero), (body, zero)]);
        b.push(
            body,
            crate::ssa::IrBinaryExpr {
                r: next,
                x: i,
                y: one,
                op: IrBinaryOp::Add,
            },
        );
        b.branch(body, next, exit, body);
        b.ret(exit, vec![i]);
        let mut cfg = b.finish().unwrap();

        let before = cfg.node_count();
        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.removed, 1, "only the scratch phi goes");
        assert_eq!(cfg.node_count(), before - 1);
        assert_eq!(cfg.block(body).phi.len(), 1);
        assert_eq!(cfg.block(body).phi[0].r, i);
        assert_sound(&mut cfg);
    }

    #[test]
    fn test_already_zero_definitions_are_not_rewritten() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let zero = Reg::zero();
        b.push(entry, IrConstInt { r: zero, v: 3 });
        b.ret(entry, vec![]);
        let mut cfg = b.finish().unwrap();

        let stats = Tdce::new().apply(&mut cfg);
        assert_eq!(stats.rewrites, 0);
        assert_eq!(stats.rounds, 1);
        // Zero-only definitions are still compacted away.
        assert_eq!(stats.removed, 1);
    }

    #[test]
    fn test_unreachable_blocks_untouched() {
        let mut b = CfgBuilder::new();
        let entry = b.create_block();
        let island = b.create_block();
        b.ret(entry, vec![]);
        b.const_int(island, 4);
        b.jump(island, island);
        let mut cfg = b.finish().unwrap();

        Tdce::new().apply(&mut cfg);
        assert_eq!(cfg.block(island).ins.len(), 1);
    }

    #[test]
    fn test_run_in_session_records_rounds() {
        with_test_context(|ctx| {
            ctx.with_session(|session| {
                let mut b = CfgBuilder::new();
                let entry = b.create_block();
                let r1 = b.const_int(entry, 5);
                b.binary(entry, IrBinaryOp::Add, r1, r1);
                b.ret(entry, vec![r1]);
                let mut cfg = b.finish().unwrap();

                assert!(Pass::run(&Tdce, session, &mut cfg));
                assert!(!Pass::run(&Tdce, session, &mut cfg));

                let stats = session.stats();
                assert_eq!(stats.dce_rounds, 3);
                assert_eq!(stats.registers_rewritten, 1);
                assert_eq!(stats.nodes_removed, 1);
            });
            assert!(ctx.memory_used() > 0);
        });
    }

    #[test]
    fn test_rewrite_visible_through_trait_object() {
        let r = Reg::new(Kind::Norm, 1);
        let mut node: Box<dyn IrNode> = Box::new(IrConstInt { r, v: 1 });
        let arena = Bump::new();
        let mut dead: RegSet<'_> = HashSet::new_in(&arena);
        dead.insert(r);

        let defs = node.as_definitions().unwrap().definitions();
        assert_eq!(neutralize(defs, &dead), 1);
        assert_eq!(node.to_string(), "%z = const 1");
    }
}
