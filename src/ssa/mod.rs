//! SSA form: registers, IR nodes, the control-flow graph and its passes.

pub mod builder;
pub mod cfg;
pub mod ir;
pub mod pass;
pub mod pass_tdce;
pub mod reg;
pub mod verify;

pub use builder::CfgBuilder;
pub use cfg::{BasicBlock, BlockId, Cfg};
pub use ir::{
    defined_regs, used_regs, CallHandle, IrBinaryExpr, IrBinaryOp, IrBranch, IrCallGeneric,
    IrConstInt, IrDefinitions, IrEmit, IrJump, IrLoadArg, IrNode, IrPhi, IrReturn, IrSwitch,
    IrTerminator, IrUsages,
};
pub use pass::{Pass, PassPipeline, PipelineConfig};
pub use pass_tdce::{Tdce, TdceStats};
pub use reg::{Kind, Reg};
pub use verify::verify;
