//! Generic call registry.
//!
//! A generic call is a runtime helper invoked from encoder programs through
//! an `IrCallGeneric` node. Every call has two entry points with the same
//! observable behavior: a native function used by closure-compiled encoders
//! and an interpreter trampoline used by the emulated backend. The registry
//! is built once, on first use, and is read without locking afterwards.

use std::sync::OnceLock;

use crate::ssa::CallHandle;

/// Native entry: `(output buffer, argument words, result words)`.
pub type NativeCall = fn(&mut Vec<u8>, &[u64], &mut [u64]);

/// Interpreter trampoline.
pub type EmuCall = fn(&mut EmuCallContext<'_>);

/// A registered generic call.
#[derive(Debug)]
pub struct CallDesc {
    pub name: &'static str,
    /// Exact number of argument words.
    pub args: usize,
    /// Maximum number of result words; callers may bind fewer.
    pub rets: usize,
    pub native: NativeCall,
    pub emu: EmuCall,
}

/// View of the interpreter state handed to a trampoline.
pub struct EmuCallContext<'a> {
    buf: &'a mut Vec<u8>,
    args: &'a [u64],
    rets: &'a mut [u64],
}

impl<'a> EmuCallContext<'a> {
    pub fn new(buf: &'a mut Vec<u8>, args: &'a [u64], rets: &'a mut [u64]) -> Self {
        Self { buf, args, rets }
    }

    #[inline]
    pub fn arg(&self, i: usize) -> u64 {
        self.args[i]
    }

    /// Store result `i`; results the caller did not bind are dropped.
    #[inline]
    pub fn set_ret(&mut self, i: usize, v: u64) {
        if let Some(slot) = self.rets.get_mut(i) {
            *slot = v;
        }
    }

    #[inline]
    pub fn buf(&mut self) -> &mut Vec<u8> {
        &mut *self.buf
    }
}

/// Handle of the builtin "encode" call.
pub const F_ENCODE: CallHandle = CallHandle(0);

fn registry() -> &'static [CallDesc] {
    static REGISTRY: OnceLock<Vec<CallDesc>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let calls = vec![CallDesc {
            name: "encode",
            args: 1,
            rets: 1,
            native: encode,
            emu: emu_gcall_encode,
        }];
        log::debug!("gcall: registered {} generic calls", calls.len());
        calls
    })
}

/// Resolve a call handle.
pub fn lookup(handle: CallHandle) -> Option<&'static CallDesc> {
    registry().get(handle.0 as usize)
}

/// Append `v` as an unsigned LEB128 varint, returning the bytes written.
pub fn write_uvarint(buf: &mut Vec<u8>, mut v: u64) -> usize {
    let start = buf.len();
    while v >= 0x80 {
        buf.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
    buf.len() - start
}

/// Native "encode": varint of `args[0]`; result 0 is the byte count.
pub fn encode(buf: &mut Vec<u8>, args: &[u64], rets: &mut [u64]) {
    let n = write_uvarint(buf, args[0]);
    if let Some(r) = rets.first_mut() {
        *r = n as u64;
    }
}

/// Interpreter trampoline for "encode".
pub fn emu_gcall_encode(ctx: &mut EmuCallContext<'_>) {
    let v = ctx.arg(0);
    let n = write_uvarint(ctx.buf(), v);
    ctx.set_ret(0, n as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uvarint() {
        let mut buf = Vec::new();
        assert_eq!(write_uvarint(&mut buf, 0), 1);
        assert_eq!(write_uvarint(&mut buf, 127), 1);
        assert_eq!(write_uvarint(&mut buf, 300), 2);
        assert_eq!(buf, vec![0x00, 0x7f, 0xac, 0x02]);

        buf.clear();
        assert_eq!(write_uvarint(&mut buf, u64::MAX), 10);
        assert_eq!(buf[9], 0x01);
    }

    #[test]
    fn test_encode_registered_under_handle() {
        let desc = lookup(F_ENCODE).unwrap();
        assert_eq!(desc.name, "encode");
        assert_eq!((desc.args, desc.rets), (1, 1));
        assert!(lookup(CallHandle(99)).is_none());
    }

    #[test]
    fn test_entries_agree() {
        let desc = lookup(F_ENCODE).unwrap();
        for v in [0u64, 1, 0x80, 0x3fff, 0x4000, u64::MAX] {
            let mut native_buf = vec![0xee];
            let mut native_ret = [0u64];
            (desc.native)(&mut native_buf, &[v], &mut native_ret);

            let mut emu_buf = vec![0xee];
            let mut emu_ret = [0u64];
            (desc.emu)(&mut EmuCallContext::new(&mut emu_buf, &[v], &mut emu_ret));

            assert_eq!(native_buf, emu_buf);
            assert_eq!(native_ret, emu_ret);
            assert_eq!(native_ret[0] as usize, native_buf.len() - 1);
        }
    }

    #[test]
    fn test_unbound_result_is_dropped() {
        let mut buf = Vec::new();
        encode(&mut buf, &[5], &mut []);
        emu_gcall_encode(&mut EmuCallContext::new(&mut buf, &[6], &mut []));
        assert_eq!(buf, vec![5, 6]);
    }
}
