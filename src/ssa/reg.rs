//! SSA registers.

use std::fmt;

/// What a register holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Kind {
    /// The zero sentinel: a dead definition, reads as 0.
    Zero,
    /// Scalar machine word.
    Norm,
    /// Word holding a pointer the collector must trace.
    Ptr,
}

/// An SSA register.
///
/// Registers compare by value: two registers are the same slot exactly when
/// kind and index match. [`Reg::zero`] is the one distinguished sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg {
    kind: Kind,
    index: u32,
}

impl Reg {
    /// The zero sentinel.
    #[inline]
    pub const fn zero() -> Self {
        Self {
            kind: Kind::Zero,
            index: 0,
        }
    }

    /// Create a register. Use [`Cfg::create_register`](super::Cfg::create_register)
    /// to get fresh indices.
    ///
    /// # Panics
    ///
    /// Panics if `kind` is [`Kind::Zero`]; use [`Reg::zero`] instead.
    pub fn new(kind: Kind, index: u32) -> Self {
        assert!(kind != Kind::Zero, "reg: use Reg::zero() for the sentinel");
        Self { kind, index }
    }

    #[inline]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.kind == Kind::Zero
    }

    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.kind == Kind::Ptr
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Zero => write!(f, "%z"),
            Kind::Norm => write!(f, "%r{}", self.index),
            Kind::Ptr => write!(f, "%p{}", self.index),
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
