// This module ties the pieces together for embedders: it runs the configured pass pipeline
// over a routine's CFG inside a compilation session, assembles the optimised graph into a
// Program (which builds and pins the frame stack map), records the outcome in the session
// statistics, and optionally links the program through the process-wide linker. A single
// EncoderCompiler can be reused across sessions and routines.

//! End-to-end routine compilation.

use crate::core::error::CompileResult;
use crate::core::session::CompilationSession;
use crate::encoder::{link, Encoder, Program};
use crate::ssa::{Cfg, PassPipeline, PipelineConfig};

/// Optimises, assembles and links encoder routines.
pub struct EncoderCompiler {
    pipeline: PassPipeline,
}

impl EncoderCompiler {
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            pipeline: PassPipeline::with_config(config),
        }
    }

    pub fn pipeline(&self) -> &PassPipeline {
        &self.pipeline
    }

    /// Optimise `cfg` in place and assemble it.
    pub fn compile(
        &self,
        session: &CompilationSession<'_>,
        name: &str,
        cfg: &mut Cfg,
    ) -> CompileResult<Program> {
        session.set_current_routine(name);
        let result = self.compile_routine(session, cfg);
        session.clear_routine_state();

        match &result {
            Ok(p) => log::debug!("compiled {}: {} frame words", name, p.frame_size()),
            Err(e) => log::debug!("compiling {} failed: {}", name, e),
        }
        result
    }

    fn compile_routine(
        &self,
        session: &CompilationSession<'_>,
        cfg: &mut Cfg,
    ) -> CompileResult<Program> {
        let before = cfg.node_count();
        self.pipeline.run(session, cfg)?;
        log::trace!("optimised: {} -> {} nodes", before, cfg.node_count());

        let program = Program::assemble(cfg)?;
        session.record_program_assembled(program.frame_size());
        session.record_stack_map_pinned();
        Ok(program)
    }

    /// Compile and link with the process-wide linker.
    pub fn compile_and_link(
        &self,
        session: &CompilationSession<'_>,
        name: &str,
        cfg: &mut Cfg,
    ) -> CompileResult<Encoder> {
        let program = self.compile(session, name, cfg)?;
        Ok(link(&program))
    }
}

impl Default for EncoderCompiler {
    fn default() -> Self {
        Self::new()
    }
}
