//! Transport seam
//!
//! Framing, CRC and the physical link (serial or TCP) live behind
//! [`RegisterTransport`]. Only the two functions the batch client issues
//! are required; connection lifecycle is handled by the implementor.

use anyhow::{bail, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::HashMap;
use tracing::debug;

use crate::flat::REGISTER_COUNT;

/// Half-duplex register link to one slave
pub trait RegisterTransport: Send {
    /// Function 3: returns `quantity * 2` data bytes
    fn read_holding_registers(&mut self, register: u16, quantity: u16) -> Result<Bytes>;

    /// Function 16: returns the raw response data
    fn write_multiple_registers(
        &mut self,
        register: u16,
        quantity: u16,
        value: &[u8],
    ) -> Result<Bytes>;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    fn read_holding_registers(&mut self, register: u16, quantity: u16) -> Result<Bytes> {
        (**self).read_holding_registers(register, quantity)
    }

    fn write_multiple_registers(
        &mut self,
        register: u16,
        quantity: u16,
        value: &[u8],
    ) -> Result<Bytes> {
        (**self).write_multiple_registers(register, quantity, value)
    }
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for &mut T {
    fn read_holding_registers(&mut self, register: u16, quantity: u16) -> Result<Bytes> {
        (**self).read_holding_registers(register, quantity)
    }

    fn write_multiple_registers(
        &mut self,
        register: u16,
        quantity: u16,
        value: &[u8],
    ) -> Result<Bytes> {
        (**self).write_multiple_registers(register, quantity, value)
    }
}

// ============================================================================
// In-memory slave
// ============================================================================

/// Wire call observed by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Read { register: u16, quantity: u16 },
    Write { register: u16, quantity: u16, value: Vec<u8> },
}

impl TransportCall {
    pub fn register(&self) -> u16 {
        match self {
            TransportCall::Read { register, .. } | TransportCall::Write { register, .. } => {
                *register
            }
        }
    }
}

/// In-memory slave holding the full register range.
///
/// Records every call (including failed ones) and can be told to fail
/// upcoming calls at a given starting register, for exercising retries.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    registers: Vec<u16>,
    /// Starting register -> remaining failures
    failures: HashMap<u16, usize>,
    calls: Vec<TransportCall>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            registers: vec![0; REGISTER_COUNT],
            failures: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn set_register(&mut self, register: u16, value: u16) {
        self.registers[usize::from(register)] = value;
    }

    /// Fill consecutive registers from `register`, clamped at the top of the range
    pub fn set_registers(&mut self, register: u16, values: &[u16]) {
        let start = usize::from(register);
        let end = (start + values.len()).min(REGISTER_COUNT);
        self.registers[start..end].copy_from_slice(&values[..end - start]);
    }

    pub fn register(&self, register: u16) -> u16 {
        self.registers[usize::from(register)]
    }

    /// Fail the next `times` calls that start at `register`
    pub fn fail_at(&mut self, register: u16, times: usize) {
        self.failures.insert(register, times);
    }

    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    fn injected_failure(&mut self, register: u16) -> bool {
        match self.failures.get_mut(&register) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn range(register: u16, quantity: u16) -> Result<std::ops::Range<usize>> {
        let start = usize::from(register);
        let end = start + usize::from(quantity);
        if quantity == 0 || end > REGISTER_COUNT {
            bail!("illegal data address: {} x{}", register, quantity);
        }
        Ok(start..end)
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterTransport for MemoryTransport {
    fn read_holding_registers(&mut self, register: u16, quantity: u16) -> Result<Bytes> {
        self.calls.push(TransportCall::Read { register, quantity });
        if self.injected_failure(register) {
            bail!("injected failure at {}", register);
        }

        let range = Self::range(register, quantity)?;
        let mut buf = BytesMut::with_capacity(range.len() * 2);
        for value in &self.registers[range] {
            buf.put_u16(*value);
        }
        debug!("Memory RX: {} x{}", register, quantity);
        Ok(buf.freeze())
    }

    fn write_multiple_registers(
        &mut self,
        register: u16,
        quantity: u16,
        value: &[u8],
    ) -> Result<Bytes> {
        self.calls.push(TransportCall::Write {
            register,
            quantity,
            value: value.to_vec(),
        });
        if self.injected_failure(register) {
            bail!("injected failure at {}", register);
        }

        let range = Self::range(register, quantity)?;
        if value.len() != range.len() * 2 {
            bail!(
                "illegal data value: {} bytes for {} registers",
                value.len(),
                quantity
            );
        }
        for (slot, word) in self.registers[range].iter_mut().zip(value.chunks_exact(2)) {
            *slot = u16::from_be_bytes([word[0], word[1]]);
        }
        debug!("Memory TX: {} x{}", register, quantity);

        // Function 16 echoes the starting address and quantity
        let mut echo = BytesMut::with_capacity(4);
        echo.put_u16(register);
        echo.put_u16(quantity);
        Ok(echo.freeze())
    }
}
