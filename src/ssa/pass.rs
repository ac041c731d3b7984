// This module defines the optimisation pipeline that runs over a CFG before it is assembled
// into an encoder program. A Pass is a named in-place rewrite that reports whether it
// changed the graph; the pipeline runs its registered passes in order, records every
// invocation in the compilation session, and optionally verifies SSA form after each pass.
// PipelineConfig selects the default passes (currently TDCE) and the verification mode.
// When TDCE is enabled the final verification also requires that no non-zero register is
// left defined but unread.

//! Pass trait and pipeline.

use super::cfg::Cfg;
use super::pass_tdce::Tdce;
use super::verify::verify;
use crate::core::error::CompileResult;
use crate::core::session::CompilationSession;

/// An in-place CFG rewrite.
pub trait Pass {
    /// Short name used for statistics and logs.
    fn name(&self) -> &'static str;

    /// Rewrite `cfg`; return true if anything changed.
    fn run(&self, session: &CompilationSession<'_>, cfg: &mut Cfg) -> bool;
}

/// Configuration for the optimisation pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Enable trivial dead-code elimination.
    pub enable_tdce: bool,

    /// Verify SSA form after every pass.
    pub verify: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enable_tdce: true,
            verify: true,
        }
    }
}

impl PipelineConfig {
    /// No passes and no verification.
    pub fn none() -> Self {
        Self {
            enable_tdce: false,
            verify: false,
        }
    }
}

/// Ordered list of passes.
pub struct PassPipeline {
    config: PipelineConfig,
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    /// Create a pipeline with the default configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a pipeline and register the passes `config` enables.
    pub fn with_config(config: PipelineConfig) -> Self {
        let mut pipeline = Self {
            config,
            passes: Vec::new(),
        };
        if pipeline.config.enable_tdce {
            pipeline.register(Tdce::new());
        }
        pipeline
    }

    /// Append a pass.
    pub fn register<P: Pass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// Registered pass names, in run order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass once, in order.
    pub fn run(&self, session: &CompilationSession<'_>, cfg: &mut Cfg) -> CompileResult<bool> {
        if self.config.verify {
            verify(cfg, false)?;
        }

        let mut changed = false;
        for pass in &self.passes {
            let name = pass.name();
            session.record_pass(name);
            let did = pass.run(session, cfg);
            log::debug!("pass {}: {}", name, if did { "changed" } else { "no change" });
            changed |= did;

            if self.config.verify {
                verify(cfg, false)?;
            }
        }

        if self.config.verify && self.config.enable_tdce {
            verify(cfg, true)?;
        }
        Ok(changed)
    }
}

impl Default for PassPipeline {
    fn default() -> Self {
        Self::new()
    }
}
