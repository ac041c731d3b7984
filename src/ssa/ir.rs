// This module defines the IR node model consumed by the SSA passes. Nodes are trait objects
// with two independent, optional capabilities: IrDefinitions (the ordered registers a node
// declares) and IrUsages (the ordered registers it reads). Both hand out mutable references
// into the node's own fields, so a pass that rewrites a register through the returned
// reference updates the node in place. A node advertises a capability by returning Some
// from as_definitions/as_usages; pure control flow declares nothing and constants read
// nothing. IrEmit and IrCallGeneric report has_side_effects, so dead-code elimination
// keeps them even after their results are neutralized. Terminators are nodes that also
// report successor blocks. The concrete instruction set here is the small subset needed
// by the encoder programs.

//! IR nodes and their register capabilities.

use std::any::Any;
use std::fmt;

use super::cfg::BlockId;
use super::reg::Reg;

/// Exposes the registers a node defines, in order.
pub trait IrDefinitions {
    fn definitions(&mut self) -> Vec<&mut Reg>;
}

/// Exposes the registers a node reads, in order.
pub trait IrUsages {
    fn usages(&mut self) -> Vec<&mut Reg>;
}

/// A PHI node, instruction, or terminator.
pub trait IrNode: fmt::Display + Send + Sync + 'static {
    /// The "declares registers" capability, if the node has it.
    fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
        None
    }

    /// The "reads registers" capability, if the node has it.
    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        None
    }

    /// Whether running the node is observable beyond the registers it defines.
    /// Dead-code elimination keeps such nodes even when every result is dead.
    fn has_side_effects(&self) -> bool {
        false
    }

    /// Concrete type access for lowering.
    fn as_any(&self) -> &dyn Any;
}

/// A node that ends a basic block.
pub trait IrTerminator: IrNode {
    /// Control-flow successors, in edge order.
    fn successors(&self) -> Vec<BlockId>;
}

/// Copy out the registers a node defines.
pub fn defined_regs<N: IrNode + ?Sized>(node: &mut N) -> Vec<Reg> {
    node.as_definitions()
        .map(|d| d.definitions().into_iter().map(|r| *r).collect())
        .unwrap_or_default()
}

/// Copy out the registers a node reads.
pub fn used_regs<N: IrNode + ?Sized>(node: &mut N) -> Vec<Reg> {
    node.as_usages()
        .map(|u| u.usages().into_iter().map(|r| *r).collect())
        .unwrap_or_default()
}

/// Symbolic handle of a generic call, resolved by the encoder's call registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallHandle(pub u32);

impl fmt::Display for CallHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// PHI
// =============================================================================

/// PHI node: selects an incoming value by predecessor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrPhi {
    pub r: Reg,
    pub v: Vec<(BlockId, Reg)>,
}

impl IrPhi {
    pub fn new(r: Reg, v: Vec<(BlockId, Reg)>) -> Self {
        Self { r, v }
    }

    /// Incoming value for edges from `pred`.
    pub fn incoming(&self, pred: BlockId) -> Option<Reg> {
        self.v.iter().find(|(b, _)| *b == pred).map(|(_, r)| *r)
    }
}

impl IrDefinitions for IrPhi {
    fn definitions(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.r]
    }
}

impl IrUsages for IrPhi {
    fn usages(&mut self) -> Vec<&mut Reg> {
        self.v.iter_mut().map(|(_, r)| r).collect()
    }
}

impl fmt::Display for IrPhi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = phi ", self.r)?;
        for (i, (b, r)) in self.v.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", b, r)?;
        }
        Ok(())
    }
}

// =============================================================================
// Instructions
// =============================================================================

/// `r = const v`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrConstInt {
    pub r: Reg,
    pub v: u64,
}

impl IrDefinitions for IrConstInt {
    fn definitions(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.r]
    }
}

impl IrNode for IrConstInt {
    fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IrConstInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = const {}", self.r, self.v)
    }
}

/// `r = arg id`: loads one argument word of the encoder call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrLoadArg {
    pub r: Reg,
    pub id: usize,
}

impl IrDefinitions for IrLoadArg {
    fn definitions(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.r]
    }
}

impl IrNode for IrLoadArg {
    fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IrLoadArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = arg {}", self.r, self.id)
    }
}

/// Wrapping binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrBinaryOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl IrBinaryOp {
    /// Evaluate on machine words. Shift amounts are taken modulo 64.
    #[inline]
    pub fn eval(self, x: u64, y: u64) -> u64 {
        match self {
            IrBinaryOp::Add => x.wrapping_add(y),
            IrBinaryOp::Sub => x.wrapping_sub(y),
            IrBinaryOp::Mul => x.wrapping_mul(y),
            IrBinaryOp::And => x & y,
            IrBinaryOp::Or => x | y,
            IrBinaryOp::Xor => x ^ y,
            IrBinaryOp::Shl => x.wrapping_shl(y as u32),
            IrBinaryOp::Shr => x.wrapping_shr(y as u32),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            IrBinaryOp::Add => "add",
            IrBinaryOp::Sub => "sub",
            IrBinaryOp::Mul => "mul",
            IrBinaryOp::And => "and",
            IrBinaryOp::Or => "or",
            IrBinaryOp::Xor => "xor",
            IrBinaryOp::Shl => "shl",
            IrBinaryOp::Shr => "shr",
        }
    }
}

/// `r = op x, y`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrBinaryExpr {
    pub r: Reg,
    pub x: Reg,
    pub y: Reg,
    pub op: IrBinaryOp,
}

impl IrDefinitions for IrBinaryExpr {
    fn definitions(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.r]
    }
}

impl IrUsages for IrBinaryExpr {
    fn usages(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.x, &mut self.y]
    }
}

impl IrNode for IrBinaryExpr {
    fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
        Some(self)
    }

    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IrBinaryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}, {}", self.r, self.op.name(), self.x, self.y)
    }
}

/// `emit.width v`: appends the low `width` bytes of `v`, little endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrEmit {
    pub v: Reg,
    pub width: u8,
}

impl IrUsages for IrEmit {
    fn usages(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.v]
    }
}

impl IrNode for IrEmit {
    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    fn has_side_effects(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IrEmit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "emit.{} {}", self.width, self.v)
    }
}

/// `rets... = gcall func(args...)`
///
/// A call without results declares nothing and is never removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrCallGeneric {
    pub func: CallHandle,
    pub args: Vec<Reg>,
    pub rets: Vec<Reg>,
}

impl IrDefinitions for IrCallGeneric {
    fn definitions(&mut self) -> Vec<&mut Reg> {
        self.rets.iter_mut().collect()
    }
}

impl IrUsages for IrCallGeneric {
    fn usages(&mut self) -> Vec<&mut Reg> {
        self.args.iter_mut().collect()
    }
}

impl IrNode for IrCallGeneric {
    fn as_definitions(&mut self) -> Option<&mut dyn IrDefinitions> {
        Some(self)
    }

    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    // Every generic call is handed the output buffer.
    fn has_side_effects(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Display for IrCallGeneric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.rets.is_empty() {
            write!(f, "{} = ", join(&self.rets))?;
        }
        write!(f, "gcall {}({})", self.func, join(&self.args))
    }
}

// =============================================================================
// Terminators
// =============================================================================

/// `ret values...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrReturn {
    pub r: Vec<Reg>,
}

impl IrUsages for IrReturn {
    fn usages(&mut self) -> Vec<&mut Reg> {
        self.r.iter_mut().collect()
    }
}

impl IrNode for IrReturn {
    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl IrTerminator for IrReturn {
    fn successors(&self) -> Vec<BlockId> {
        Vec::new()
    }
}

impl fmt::Display for IrReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ret {}", join(&self.r))
    }
}

/// `jmp to`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrJump {
    pub to: BlockId,
}

impl IrNode for IrJump {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl IrTerminator for IrJump {
    fn successors(&self) -> Vec<BlockId> {
        vec![self.to]
    }
}

impl fmt::Display for IrJump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "jmp {}", self.to)
    }
}

/// `br cond, to, otherwise`: takes `to` when `cond` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrBranch {
    pub cond: Reg,
    pub to: BlockId,
    pub otherwise: BlockId,
}

impl IrUsages for IrBranch {
    fn usages(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.cond]
    }
}

impl IrNode for IrBranch {
    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl IrTerminator for IrBranch {
    fn successors(&self) -> Vec<BlockId> {
        vec![self.to, self.otherwise]
    }
}

impl fmt::Display for IrBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "br {}, {}, {}", self.cond, self.to, self.otherwise)
    }
}

/// `switch v, [targets...], default`: jumps to `targets[v]` when in range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrSwitch {
    pub v: Reg,
    pub targets: Vec<BlockId>,
    pub default: BlockId,
}

impl IrUsages for IrSwitch {
    fn usages(&mut self) -> Vec<&mut Reg> {
        vec![&mut self.v]
    }
}

impl IrNode for IrSwitch {
    fn as_usages(&mut self) -> Option<&mut dyn IrUsages> {
        Some(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl IrTerminator for IrSwitch {
    fn successors(&self) -> Vec<BlockId> {
        let mut succs = self.targets.clone();
        succs.push(self.default);
        succs
    }
}

impl fmt::Display for IrSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "switch {}, [{}], {}", self.v, join(&self.targets), self.default)
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|x| x.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
