// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession is the hub that owns a borrowed arena and tracks per-compilation
// state with a unified lifetime. Optimisation passes allocate their scratch working sets
// (for example the TDCE declaration set) in the arena, so a whole pipeline run performs no
// per-round heap traffic and everything is released at once when the arena is dropped or
// reset. The session also records statistics: passes run, fixed-point rounds, register
// rewrites, removed PHI nodes and instructions, programs assembled and stack maps pinned.
// SessionStats is a plain snapshot of those counters and implements Display for logging.

//! Arena-based compilation session management.
//!
//! All scratch data created while optimising one CFG is tied to the session
//! lifetime, which keeps pass code free of explicit lifetime plumbing.

use bumpalo::Bump;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;

/// Arena-based compilation session.
///
/// The arena is borrowed so the embedder decides how long compilation memory
/// lives (one arena per routine, or one reused arena per worker).
pub struct CompilationSession<'arena> {
    /// Arena allocator for pass working sets.
    arena: &'arena Bump,

    /// Session statistics for debugging and tuning.
    stats: RefCell<SessionStats>,

    /// Name of the routine currently being compiled.
    current_routine: RefCell<Option<String>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            current_routine: RefCell::new(None),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Set the routine being compiled.
    pub fn set_current_routine(&self, name: &str) {
        *self.current_routine.borrow_mut() = Some(name.to_string());
    }

    /// Name of the routine being compiled, if any.
    pub fn current_routine(&self) -> Option<String> {
        self.current_routine.borrow().clone()
    }

    /// Record that a pass ran over the CFG.
    pub fn record_pass(&self, name: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.passes_run += 1;
        *stats.pass_counts.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Record one dead-code-elimination round and what it changed.
    pub fn record_dce_round(&self, rewrites: usize, removed: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.dce_rounds += 1;
        stats.registers_rewritten += rewrites;
        stats.nodes_removed += removed;
    }

    /// Record an assembled program.
    pub fn record_program_assembled(&self, frame_size: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.programs_assembled += 1;
        stats.frame_words += frame_size;
    }

    /// Record a stack map pinned on behalf of this session.
    pub fn record_stack_map_pinned(&self) {
        self.stats.borrow_mut().stack_maps_pinned += 1;
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }

    /// Clear routine-specific state before starting the next routine.
    pub fn clear_routine_state(&self) {
        *self.current_routine.borrow_mut() = None;
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of pass invocations.
    pub passes_run: usize,

    /// Invocation count per pass name.
    pub pass_counts: HashMap<String, usize>,

    /// Dead-code-elimination rounds, including the final no-change round.
    pub dce_rounds: usize,

    /// Registers rewritten to the zero sentinel.
    pub registers_rewritten: usize,

    /// PHI nodes and instructions dropped from blocks.
    pub nodes_removed: usize,

    /// Programs assembled from optimised CFGs.
    pub programs_assembled: usize,

    /// Total frame words across assembled programs.
    pub frame_words: usize,

    /// Stack maps pinned.
    pub stack_maps_pinned: usize,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Passes run: {}", self.passes_run)?;
        writeln!(f, "  DCE rounds: {}", self.dce_rounds)?;
        writeln!(f, "  Registers rewritten: {}", self.registers_rewritten)?;
        writeln!(f, "  Nodes removed: {}", self.nodes_removed)?;
        writeln!(f, "  Programs assembled: {}", self.programs_assembled)?;
        writeln!(f, "  Frame words: {}", self.frame_words)?;
        writeln!(f, "  Stack maps pinned: {}", self.stack_maps_pinned)?;

        if !self.pass_counts.is_empty() {
            writeln!(f, "  Pass breakdown:")?;
            let mut sorted: Vec<_> = self.pass_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

            for (name, count) in sorted {
                writeln!(f, "    {}: {}", name, count)?;
            }
        }

        Ok(())
    }
}
