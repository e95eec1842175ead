//! Flat register address space
//!
//! A byte buffer addressed by absolute offset, used to lay merged read
//! results back out by register number. Both accessors are total: any
//! offset or size, including negative ones, is accepted and clamped.

/// Number of addressable holding registers
pub const REGISTER_COUNT: usize = 1 << 16;

/// Bytes needed to cover every register
pub const ADDRESS_SPACE_BYTES: usize = REGISTER_COUNT * 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatSpace {
    buf: Vec<u8>,
}

impl FlatSpace {
    /// Zeroed buffer of `size` bytes
    pub fn new(size: usize) -> Self {
        Self { buf: vec![0; size] }
    }

    /// Zeroed buffer covering the full 16-bit register range
    pub fn for_registers() -> Self {
        Self::new(ADDRESS_SPACE_BYTES)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn start(&self, offset: i64) -> Option<usize> {
        let start = usize::try_from(offset).ok()?;
        (start < self.buf.len()).then_some(start)
    }

    /// Copy `data` to `offset`, returning the number of bytes copied.
    ///
    /// Out-of-range offsets copy nothing; data running past the end is
    /// truncated. Compare the result with `data.len()` to detect truncation.
    pub fn set(&mut self, offset: i64, data: &[u8]) -> usize {
        let Some(start) = self.start(offset) else {
            return 0;
        };
        let count = data.len().min(self.buf.len() - start);
        self.buf[start..start + count].copy_from_slice(&data[..count]);
        count
    }

    /// Bytes in `[offset, offset + size)`.
    ///
    /// Returns an empty slice for negative arguments or an offset past the
    /// end, and the remainder of the buffer when the range runs past it.
    pub fn get(&self, offset: i64, size: i64) -> &[u8] {
        let Ok(size) = usize::try_from(size) else {
            return &[];
        };
        let Some(start) = self.start(offset) else {
            return &[];
        };
        let end = start.saturating_add(size).min(self.buf.len());
        &self.buf[start..end]
    }

    /// Copy a register chunk to its byte offset
    pub fn set_registers(&mut self, register: u16, data: &[u8]) -> usize {
        self.set(i64::from(register) * 2, data)
    }

    /// Bytes of `quantity` registers starting at `register`
    pub fn get_registers(&self, register: u16, quantity: u16) -> &[u8] {
        self.get(i64::from(register) * 2, i64::from(quantity) * 2)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn filled(bytes: &[u8]) -> FlatSpace {
        let mut space = FlatSpace::new(bytes.len());
        space.set(0, bytes);
        space
    }

    // ========== set() tests ==========

    #[test]
    fn test_set_in_range() {
        let mut space = FlatSpace::new(4);
        assert_eq!(space.set(1, &[7, 8]), 2);
        assert_eq!(space.get(0, 4), &[0, 7, 8, 0]);
    }

    #[test]
    fn test_set_negative_offset_copies_nothing() {
        let mut space = FlatSpace::new(3);
        assert_eq!(space.set(-1, &[1, 2, 3]), 0);
        assert_eq!(space.get(0, 3), &[0, 0, 0]);
    }

    #[test]
    fn test_set_past_end_copies_nothing() {
        let mut space = FlatSpace::new(3);
        assert_eq!(space.set(3, &[1]), 0);
        assert_eq!(space.set(i64::MAX, &[1]), 0);
    }

    #[test]
    fn test_set_truncates_at_end() {
        let mut space = FlatSpace::new(3);
        assert_eq!(space.set(1, &[5, 6, 7, 8]), 2);
        assert_eq!(space.get(0, 3), &[0, 5, 6]);
    }

    #[test]
    fn test_set_empty_data() {
        let mut space = FlatSpace::new(3);
        assert_eq!(space.set(0, &[]), 0);
    }

    // ========== get() tests ==========

    #[test]
    fn test_get_at_end_is_empty() {
        let space = filled(&[1, 2, 3]);
        assert!(space.get(3, 3).is_empty());
    }

    #[test]
    fn test_get_negative_arguments_are_empty() {
        let space = filled(&[1, 2, 3]);
        assert!(space.get(-1, 2).is_empty());
        assert!(space.get(0, -1).is_empty());
        assert!(space.get(i64::MIN, i64::MIN).is_empty());
    }

    #[test]
    fn test_get_partial_overlap_returns_remainder() {
        let space = filled(&[1, 2, 3]);
        assert_eq!(space.get(1, 10), &[2, 3]);
        assert_eq!(space.get(2, i64::MAX), &[3]);
    }

    #[test]
    fn test_get_zero_size() {
        let space = filled(&[1, 2, 3]);
        assert!(space.get(1, 0).is_empty());
    }

    // ========== register helpers ==========

    #[test]
    fn test_register_space_covers_last_register() {
        let mut space = FlatSpace::for_registers();
        assert_eq!(space.len(), 131_072);

        assert_eq!(space.set_registers(u16::MAX, &[0xAB, 0xCD]), 2);
        assert_eq!(space.get_registers(u16::MAX, 1), &[0xAB, 0xCD]);
        // Reading past the last register is clamped
        assert_eq!(space.get_registers(u16::MAX, 4), &[0xAB, 0xCD]);
    }

    #[test]
    fn test_merged_chunk_resliced_by_register() {
        let mut space = FlatSpace::for_registers();
        // One merged chunk covering registers 10..13
        space.set_registers(10, &[0, 1, 0, 2, 0, 3]);

        assert_eq!(space.get_registers(10, 1), &[0, 1]);
        assert_eq!(space.get_registers(11, 2), &[0, 2, 0, 3]);
    }
}
