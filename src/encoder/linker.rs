//! Process-wide linking strategy.
//!
//! At most one [`Linker`] is installed per process, normally during startup.
//! Until one is, [`link`] produces interpreter-backed encoders.

use std::sync::OnceLock;

use thiserror::Error;

use super::emu::link_emu;
use super::program::Program;
use super::Encoder;

/// Strategy that turns an assembled program into an encoder.
pub trait Linker: Send + Sync {
    fn link(&self, p: &Program) -> Encoder;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("A linker is already installed")]
    AlreadyInstalled,
}

static LINKER: OnceLock<Box<dyn Linker>> = OnceLock::new();

/// Install the process-wide linker.
///
/// Only the first call takes effect; later calls keep the installed linker
/// and return [`LinkError::AlreadyInstalled`].
pub fn set_linker(linker: Box<dyn Linker>) -> Result<(), LinkError> {
    match LINKER.set(linker) {
        Ok(()) => {
            log::debug!("linker: installed");
            Ok(())
        }
        Err(_) => {
            log::warn!("linker: already installed, ignoring replacement");
            Err(LinkError::AlreadyInstalled)
        }
    }
}

/// Whether a linker has been installed.
pub fn has_linker() -> bool {
    LINKER.get().is_some()
}

/// Link `p` with the installed linker, or the interpreter if there is none.
pub fn link(p: &Program) -> Encoder {
    match LINKER.get() {
        Some(linker) => linker.link(p),
        None => {
            log::trace!("linker: none installed, using interpreter");
            link_emu(p)
        }
    }
}
