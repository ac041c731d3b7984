//! Structural SSA checks run between passes.
//!
//! Only blocks reachable from the entry are checked. The zero sentinel may be
//! read and "defined" any number of times.

use std::collections::{HashMap, HashSet};

use super::cfg::{BlockId, Cfg};
use super::ir::{defined_regs, used_regs, IrUsages};
use super::reg::Reg;
use crate::core::error::{CompileError, CompileResult};

/// Check single assignment, def-before-use and PHI predecessor edges.
///
/// With `require_live` set, additionally reject any non-zero register that is
/// defined but never read, which is the state dead-code elimination leaves.
pub fn verify(cfg: &mut Cfg, require_live: bool) -> CompileResult<()> {
    let preds = cfg.predecessors();
    let mut defs: HashSet<Reg> = HashSet::new();
    let mut uses: Vec<(BlockId, Reg)> = Vec::new();
    let mut first_err: Option<CompileError> = None;

    cfg.post_order(|bb| {
        let id = bb.id;
        let mut define = |r: Reg, err: &mut Option<CompileError>| {
            if !r.is_zero() && !defs.insert(r) && err.is_none() {
                *err = Some(CompileError::DuplicateDefinition { reg: r });
            }
        };

        for phi in &mut bb.phi {
            let r = phi.r;
            define(r, &mut first_err);
            for &(pred, _) in &phi.v {
                let ok = preds.get(&id).is_some_and(|p| p.contains(&pred));
                if !ok && first_err.is_none() {
                    first_err = Some(CompileError::InvalidPhi {
                        block: id,
                        reg: r,
                        pred,
                    });
                }
            }
            uses.extend(phi.usages().into_iter().map(|u| (id, *u)));
        }
        for ins in bb.ins.iter_mut() {
            for r in defined_regs(ins.as_mut()) {
                define(r, &mut first_err);
            }
            uses.extend(used_regs(ins.as_mut()).into_iter().map(|u| (id, u)));
        }
        if let Some(d) = bb.term.as_definitions() {
            for r in d.definitions() {
                define(*r, &mut first_err);
            }
        }
        if let Some(u) = bb.term.as_usages() {
            uses.extend(u.usages().into_iter().map(|r| (id, *r)));
        }
    });

    if let Some(err) = first_err {
        return Err(err);
    }

    let mut read: HashMap<Reg, BlockId> = HashMap::new();
    for (block, reg) in uses {
        if reg.is_zero() {
            continue;
        }
        if !defs.contains(&reg) {
            return Err(CompileError::UndefinedRegister { block, reg });
        }
        read.entry(reg).or_insert(block);
    }

    if require_live {
        let mut dead: Vec<Reg> = defs.into_iter().filter(|r| !read.contains_key(r)).collect();
        dead.sort();
        if let Some(&reg) = dead.first() {
            return Err(CompileError::UnusedDefinition { reg });
        }
    }

    Ok(())
}
