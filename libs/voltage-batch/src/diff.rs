//! Differential write filter
//!
//! Drops writes whose value is already known to be on the slave. The filter
//! trusts the snapshot completely: if it does not reflect the true slave
//! state, a dropped write silently skips a required update.

use tracing::debug;

use crate::ops::Write;
use crate::types::Registers;

/// Keep the writes that target a register absent from `snapshot` or whose
/// bytes differ from the snapshot value. Without a snapshot everything passes.
pub fn differential_filter<'a>(
    writes: &'a [Write],
    snapshot: Option<&Registers>,
) -> Vec<&'a Write> {
    let Some(snapshot) = snapshot else {
        return writes.iter().collect();
    };

    writes
        .iter()
        .filter(|write| match snapshot.get(write.register) {
            Some(known) if known.to_bytes() == write.bytes() => {
                debug!("Write at {} unchanged, skipped", write.register);
                false
            }
            _ => true,
        })
        .collect()
}
