//! Contiguous-range merge optimizer
//!
//! Operations are sorted by register and adjacent ranges are coalesced while
//! the merged quantity stays within the function ceiling:
//!
//! ```text
//! A.register + A.quantity == B.register  &&  A.quantity + B.quantity <= ceiling
//! ```
//!
//! The ceiling is checked before each merge; a merge that would exceed it
//! starts a new operation instead. Only exact adjacency merges: overlapping
//! ranges are passed through as separate operations, with no deduplication
//! or conflict detection.

use tracing::debug;

use crate::ops::{ReadOp, WriteOp, MAX_READ_QUANTITY, MAX_WRITE_QUANTITY};

/// An operation that can absorb the one directly after it
trait Coalesce: Sized {
    fn register(&self) -> u16;
    fn quantity(&self) -> u16;
    fn absorb(&mut self, next: Self);

    fn end(&self) -> u32 {
        u32::from(self.register()) + u32::from(self.quantity())
    }
}

impl Coalesce for ReadOp {
    fn register(&self) -> u16 {
        self.register
    }

    fn quantity(&self) -> u16 {
        self.quantity
    }

    fn absorb(&mut self, next: Self) {
        self.quantity += next.quantity;
    }
}

impl Coalesce for WriteOp {
    fn register(&self) -> u16 {
        self.register
    }

    fn quantity(&self) -> u16 {
        self.quantity
    }

    fn absorb(&mut self, next: Self) {
        self.quantity += next.quantity;
        self.value.extend_from_slice(&next.value);
    }
}

fn coalesce<T: Coalesce + Clone>(ops: &[T], limit: u16) -> Vec<T> {
    let mut sorted = ops.to_vec();
    sorted.sort_by_key(|op| op.register());

    let mut optimized = Vec::with_capacity(sorted.len());
    let mut pending = sorted.into_iter().peekable();

    while let Some(mut acc) = pending.next() {
        while let Some(next) = pending.peek() {
            let adjacent = acc.end() == u32::from(next.register());
            let merged = u32::from(acc.quantity()) + u32::from(next.quantity());
            if !adjacent || merged > u32::from(limit) {
                break;
            }
            if let Some(next) = pending.next() {
                acc.absorb(next);
            }
        }
        optimized.push(acc);
    }

    optimized
}

/// Merge read ops against the function 3 ceiling
pub fn optimize_reads(ops: &[ReadOp]) -> Vec<ReadOp> {
    optimize_reads_with_limit(ops, MAX_READ_QUANTITY)
}

/// Merge read ops against a device limit
pub fn optimize_reads_with_limit(ops: &[ReadOp], limit: u16) -> Vec<ReadOp> {
    let optimized = coalesce(ops, limit);
    debug!("Read ops merged: {} -> {}", ops.len(), optimized.len());
    optimized
}

/// Merge write ops against the function 16 ceiling, concatenating payloads
pub fn optimize_writes(ops: &[WriteOp]) -> Vec<WriteOp> {
    optimize_writes_with_limit(ops, MAX_WRITE_QUANTITY)
}

/// Merge write ops against a device limit
pub fn optimize_writes_with_limit(ops: &[WriteOp], limit: u16) -> Vec<WriteOp> {
    let optimized = coalesce(ops, limit);
    debug!("Write ops merged: {} -> {}", ops.len(), optimized.len());
    optimized
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn r(register: u16, quantity: u16) -> ReadOp {
        ReadOp { register, quantity }
    }

    fn w(register: u16, quantity: u16, value: &[u8]) -> WriteOp {
        WriteOp {
            register,
            quantity,
            value: value.to_vec(),
        }
    }

    // ========== reads ==========

    #[test]
    fn test_reads_merge_two_requests() {
        let ops = [r(2, 2), r(4, 2), r(7, 1)];
        assert_eq!(optimize_reads(&ops), vec![r(2, 4), r(7, 1)]);
    }

    #[test]
    fn test_reads_merge_chain() {
        let ops = [r(2, 2), r(4, 2), r(6, 1), r(7, 1), r(9, 3)];
        assert_eq!(optimize_reads(&ops), vec![r(2, 6), r(9, 3)]);
    }

    #[test]
    fn test_reads_sorted_before_merge() {
        let ops = [r(9, 3), r(4, 2), r(7, 1), r(2, 2)];
        assert_eq!(optimize_reads(&ops), vec![r(2, 4), r(7, 1), r(9, 3)]);
    }

    #[test]
    fn test_reads_skip_merge_over_ceiling() {
        let ops = [r(2, 4), r(6, 2045)];
        assert_eq!(optimize_reads(&ops), vec![r(2, 4), r(6, 2045)]);
    }

    #[test]
    fn test_reads_merge_exactly_at_ceiling() {
        let ops = [r(0, 2000), r(2000, 47)];
        assert_eq!(optimize_reads(&ops), vec![r(0, 2047)]);
    }

    #[test]
    fn test_reads_new_boundary_after_ceiling() {
        // First two fill the ceiling, the rest start a new op
        let ops = [r(0, 2000), r(2000, 47), r(2047, 10), r(2057, 5)];
        assert_eq!(optimize_reads(&ops), vec![r(0, 2047), r(2047, 15)]);
    }

    #[test]
    fn test_reads_overlapping_ranges_pass_through() {
        // Overlap is not adjacency: no merge, no dedup
        let ops = [r(10, 4), r(12, 4)];
        assert_eq!(optimize_reads(&ops), vec![r(10, 4), r(12, 4)]);
    }

    #[test]
    fn test_reads_device_limit() {
        let ops = [r(0, 1), r(1, 1), r(2, 1), r(3, 1), r(4, 1)];
        assert_eq!(
            optimize_reads_with_limit(&ops, 2),
            vec![r(0, 2), r(2, 2), r(4, 1)]
        );
    }

    #[test]
    fn test_reads_at_top_of_address_space() {
        let ops = [r(65_534, 1), r(65_535, 1)];
        assert_eq!(optimize_reads(&ops), vec![r(65_534, 2)]);
    }

    #[test]
    fn test_reads_empty() {
        assert!(optimize_reads(&[]).is_empty());
    }

    #[test]
    fn test_reads_fixed_point() {
        let ops = [
            r(40, 2),
            r(0, 1000),
            r(1000, 1000),
            r(2000, 100),
            r(42, 1),
            r(100, 3),
            r(101, 1),
        ];
        let once = optimize_reads(&ops);
        let twice = optimize_reads(&once);
        assert_eq!(once, twice);
    }

    // ========== writes ==========

    #[test]
    fn test_writes_merge_two_requests() {
        let ops = [w(2, 2, &[3, 3, 4, 4]), w(4, 2, &[2, 3, 2, 4])];
        assert_eq!(
            optimize_writes(&ops),
            vec![w(2, 4, &[3, 3, 4, 4, 2, 3, 2, 4])]
        );
    }

    #[test]
    fn test_writes_merge_chain() {
        let ops = [
            w(2, 1, &[3, 2]),
            w(3, 1, &[3, 4]),
            w(4, 1, &[5, 2]),
            w(6, 1, &[8, 0]),
        ];
        assert_eq!(
            optimize_writes(&ops),
            vec![w(2, 3, &[3, 2, 3, 4, 5, 2]), w(6, 1, &[8, 0])]
        );
    }

    #[test]
    fn test_writes_payload_follows_register_order() {
        let ops = [w(3, 1, &[0, 3]), w(2, 1, &[0, 2])];
        assert_eq!(optimize_writes(&ops), vec![w(2, 2, &[0, 2, 0, 3])]);
    }

    #[test]
    fn test_writes_ignore_payload_contents() {
        let ops = [w(2, 1, &[]), w(3, 1, &[3, 4])];
        assert_eq!(optimize_writes(&ops), vec![w(2, 2, &[3, 4])]);
    }

    #[test]
    fn test_writes_skip_merge_over_ceiling() {
        let ops = [w(2, 10, &[]), w(12, 115, &[])];
        assert_eq!(optimize_writes(&ops), vec![w(2, 10, &[]), w(12, 115, &[])]);
    }

    #[test]
    fn test_writes_fixed_point() {
        let ops = [
            w(10, 100, &[]),
            w(110, 23, &[]),
            w(133, 1, &[0, 1]),
            w(5, 1, &[0, 5]),
            w(6, 1, &[0, 6]),
        ];
        let once = optimize_writes(&ops);
        assert_eq!(once.len(), 3);
        assert_eq!(optimize_writes(&once), once);
    }
}
