//! Operation model
//!
//! Typed requests ([`Read`], [`Write`]) are lowered into wire-level
//! operations ([`ReadOp`], [`WriteOp`]) and validated against the function
//! quantity ceilings before any traffic is issued.

use std::fmt;

use crate::error::{BatchError, Result};
use crate::types::{RegisterType, RegisterValue};

/// Maximum register quantity for function 3 (read holding registers)
pub const MAX_READ_QUANTITY: u16 = 2047;

/// Maximum register quantity for function 16 (write multiple registers)
pub const MAX_WRITE_QUANTITY: u16 = 123;

/// Bytes per register
pub const REGISTER_BYTES: usize = 2;

fn check_quantity(quantity: usize, limit: u16) -> Result<u16> {
    if quantity > usize::from(limit) {
        return Err(BatchError::TooManyRegisters { quantity, limit });
    }
    // limit is a u16, so the cast cannot truncate
    Ok(quantity as u16)
}

// ============================================================================
// Wire-level operations
// ============================================================================

/// Function 3 request covering `quantity` registers from `register`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReadOp {
    pub register: u16,
    pub quantity: u16,
}

impl ReadOp {
    /// Build a read op checked against the protocol ceiling
    pub fn new(register: u16, quantity: u16) -> Result<Self> {
        Self::with_limit(register, quantity, MAX_READ_QUANTITY)
    }

    /// Build a read op checked against a device limit
    pub fn with_limit(register: u16, quantity: u16, limit: u16) -> Result<Self> {
        let quantity = check_quantity(usize::from(quantity), limit)?;
        Ok(Self { register, quantity })
    }

    /// One past the last register covered, widened so that it cannot overflow
    pub fn end(&self) -> u32 {
        u32::from(self.register) + u32::from(self.quantity)
    }
}

/// Function 16 request writing `value` from `register`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteOp {
    pub register: u16,
    pub quantity: u16,
    pub value: Vec<u8>,
}

impl WriteOp {
    /// Build a write op checked against the protocol ceiling.
    /// The quantity is derived from the payload length.
    pub fn new(register: u16, value: Vec<u8>) -> Result<Self> {
        Self::with_limit(register, value, MAX_WRITE_QUANTITY)
    }

    pub fn with_limit(register: u16, value: Vec<u8>, limit: u16) -> Result<Self> {
        if value.len() % REGISTER_BYTES != 0 {
            return Err(BatchError::OddByteNumber(value.len()));
        }
        let quantity = check_quantity(value.len() / REGISTER_BYTES, limit)?;
        Ok(Self {
            register,
            quantity,
            value,
        })
    }

    pub fn end(&self) -> u32 {
        u32::from(self.register) + u32::from(self.quantity)
    }
}

// ============================================================================
// Typed requests
// ============================================================================

/// Read a single typed value starting at `register`
#[derive(Clone, Copy)]
pub struct Read<'a> {
    pub register: u16,
    pub ty: &'a dyn RegisterType,
}

impl<'a> Read<'a> {
    pub fn new(register: u16, ty: &'a dyn RegisterType) -> Self {
        Self { register, ty }
    }

    /// Lower into a read op sized by the type descriptor
    pub fn to_op(&self, limit: u16) -> Result<ReadOp> {
        ReadOp::with_limit(self.register, self.ty.size(), limit)
    }
}

impl fmt::Debug for Read<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Read")
            .field("register", &self.register)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Write a single typed value starting at `register`
#[derive(Debug)]
pub struct Write {
    pub register: u16,
    pub value: Box<dyn RegisterValue>,
}

impl Write {
    pub fn new(register: u16, value: impl RegisterValue) -> Self {
        Self {
            register,
            value: Box::new(value),
        }
    }

    pub fn boxed(register: u16, value: Box<dyn RegisterValue>) -> Self {
        Self { register, value }
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.value.to_bytes()
    }

    /// Lower into a write op sized by the encoded payload
    pub fn to_op(&self, limit: u16) -> Result<WriteOp> {
        WriteOp::with_limit(self.register, self.bytes(), limit)
    }
}
