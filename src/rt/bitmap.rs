//! Growable bit vector backing stack map construction.
//!
//! Bits are packed least-significant first: bit `i` lives in byte `i / 8`
//! at position `i % 8`. The backing storage grows by exactly one byte when an
//! append crosses a byte boundary, so `bytes().len() == ceil(len() / 8)`.

/// Growable bit vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    n: usize,
    b: Vec<u8>,
}

impl Bitmap {
    /// Create an empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logical bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Packed backing bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.b
    }

    /// Read bit `i`, or `None` past the end.
    #[inline]
    pub fn get(&self, i: usize) -> Option<bool> {
        (i < self.n).then(|| self.b[i / 8] & (1 << (i % 8)) != 0)
    }

    fn grow(&mut self) {
        if self.n >= self.b.len() * 8 {
            self.b.push(0);
        }
    }

    fn mark(&mut self, i: usize, bit: bool) {
        if bit {
            self.b[i / 8] |= 1 << (i % 8);
        } else {
            self.b[i / 8] &= !(1 << (i % 8));
        }
    }

    /// Overwrite an existing bit.
    ///
    /// # Panics
    ///
    /// Panics if `i` is not below [`len`](Self::len).
    pub fn set(&mut self, i: usize, bit: bool) {
        if i >= self.n {
            panic!("bitmap: invalid bit position {} (len {})", i, self.n);
        }
        self.mark(i, bit);
    }

    /// Append one bit.
    pub fn append(&mut self, bit: bool) {
        self.grow();
        self.mark(self.n, bit);
        self.n += 1;
    }

    /// Append `n` copies of `bit`.
    pub fn append_many(&mut self, n: usize, bit: bool) {
        for _ in 0..n {
            self.append(bit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_packs_lsb_first() {
        let mut bm = Bitmap::new();
        for bit in [true, false, true, true, false, false, false, true, true] {
            bm.append(bit);
        }

        assert_eq!(bm.len(), 9);
        assert_eq!(bm.as_bytes(), &[0b1000_1101, 0b0000_0001]);
    }

    #[test]
    fn test_growth_is_one_byte_per_eight_bits() {
        for k in 0..6 {
            let mut bm = Bitmap::new();
            bm.append_many(8 * k + 1, false);
            assert_eq!(bm.as_bytes().len(), k + 1, "8*{k}+1 bits");
        }

        let mut bm = Bitmap::new();
        bm.append_many(16, true);
        assert_eq!(bm.as_bytes(), &[0xff, 0xff]);
    }

    #[test]
    fn test_set_flips_existing_bits() {
        let mut bm = Bitmap::new();
        bm.append_many(10, false);
        bm.set(9, true);
        bm.set(3, true);
        assert_eq!(bm.get(9), Some(true));
        assert_eq!(bm.get(3), Some(true));

        bm.set(3, false);
        assert_eq!(bm.get(3), Some(false));
        assert_eq!(bm.get(10), None);
        assert_eq!(bm.len(), 10);
    }

    #[test]
    #[should_panic(expected = "invalid bit position")]
    fn test_set_past_end_panics() {
        let mut bm = Bitmap::new();
        bm.append_many(3, true);
        // The backing byte exists, but bit 5 was never appended.
        bm.set(5, true);
    }

    #[test]
    fn test_empty_bitmap() {
        let bm = Bitmap::new();
        assert!(bm.is_empty());
        assert!(bm.as_bytes().is_empty());
        assert_eq!(bm.get(0), None);
    }
}
