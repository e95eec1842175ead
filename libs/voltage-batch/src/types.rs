//! Register data types
//!
//! A [`RegisterType`] describes how many registers a value occupies and how to
//! decode it; a [`RegisterValue`] knows how to encode itself for the wire.
//! Type descriptors are plain immutable values passed by the caller:
//!
//! ```
//! use voltage_batch::types::{Float32CdabType, RegisterType, Uint16Type};
//!
//! assert_eq!(Uint16Type.size(), 1);
//! assert_eq!(Float32CdabType.size(), 2);
//! ```
//!
//! Additional encodings plug in by implementing both traits.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{BatchError, Result};

/// Something that can be put into the data section of a function 16 request
pub trait RegisterValue: fmt::Debug + Send + Sync + 'static {
    /// Even-length wire representation. If the value also has a matching
    /// [`RegisterType`], the length equals `size() * 2`.
    fn to_bytes(&self) -> Vec<u8>;

    fn as_any(&self) -> &dyn Any;
}

/// Register layout and decoder for one kind of value
pub trait RegisterType: fmt::Debug + Send + Sync {
    /// Size in registers (2 bytes each)
    fn size(&self) -> u16;

    /// Decode `bytes`, failing with `InvalidInput` unless `bytes.len() == size() * 2`
    fn convert(&self, bytes: &[u8]) -> Result<Box<dyn RegisterValue>>;
}

fn expect_len(bytes: &[u8], registers: u16) -> Result<()> {
    let expected = usize::from(registers) * 2;
    if bytes.len() != expected {
        return Err(BatchError::InvalidInput {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Swap the two 16-bit words of a 4-byte value, ABCD <-> CDAB
fn swap_words(b: [u8; 4]) -> [u8; 4] {
    [b[2], b[3], b[0], b[1]]
}

fn four_bytes(bytes: &[u8]) -> Result<[u8; 4]> {
    bytes.try_into().map_err(|_| BatchError::InvalidInput {
        expected: 4,
        actual: bytes.len(),
    })
}

// ============================================================================
// Uint16
// ============================================================================

/// Unsigned big-endian integer in a single register
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uint16(pub u16);

/// Descriptor for [`Uint16`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Uint16Type;

impl RegisterValue for Uint16 {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RegisterType for Uint16Type {
    fn size(&self) -> u16 {
        1
    }

    fn convert(&self, bytes: &[u8]) -> Result<Box<dyn RegisterValue>> {
        expect_len(bytes, self.size())?;
        Ok(Box::new(Uint16(u16::from_be_bytes([bytes[0], bytes[1]]))))
    }
}

// ============================================================================
// Float32 (ABCD)
// ============================================================================

/// IEEE-754 single precision in standard big-endian order (ABCD)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Float32(pub f32);

/// Descriptor for [`Float32`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Float32Type;

impl RegisterValue for Float32 {
    fn to_bytes(&self) -> Vec<u8> {
        self.0.to_be_bytes().to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RegisterType for Float32Type {
    fn size(&self) -> u16 {
        2
    }

    fn convert(&self, bytes: &[u8]) -> Result<Box<dyn RegisterValue>> {
        expect_len(bytes, self.size())?;
        Ok(Box::new(Float32(f32::from_be_bytes(four_bytes(bytes)?))))
    }
}

// ============================================================================
// Float32 (CDAB)
// ============================================================================

/// IEEE-754 single precision with the two register words swapped (CDAB).
///
/// Each word keeps its own big-endian byte order; only the word order is reversed.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Float32Cdab(pub f32);

/// Descriptor for [`Float32Cdab`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Float32CdabType;

impl RegisterValue for Float32Cdab {
    fn to_bytes(&self) -> Vec<u8> {
        swap_words(self.0.to_be_bytes()).to_vec()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl RegisterType for Float32CdabType {
    fn size(&self) -> u16 {
        2
    }

    fn convert(&self, bytes: &[u8]) -> Result<Box<dyn RegisterValue>> {
        expect_len(bytes, self.size())?;
        let abcd = swap_words(four_bytes(bytes)?);
        Ok(Box::new(Float32Cdab(f32::from_be_bytes(abcd))))
    }
}

// ============================================================================
// Registers
// ============================================================================

/// Register number to value mapping.
///
/// Returned by batched reads, and accepted by batched writes as the known
/// state of the slave for differential filtering.
#[derive(Debug, Default)]
pub struct Registers {
    values: BTreeMap<u16, Box<dyn RegisterValue>>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one at `register`
    pub fn insert(
        &mut self,
        register: u16,
        value: impl RegisterValue,
    ) -> Option<Box<dyn RegisterValue>> {
        self.values.insert(register, Box::new(value))
    }

    pub fn insert_boxed(
        &mut self,
        register: u16,
        value: Box<dyn RegisterValue>,
    ) -> Option<Box<dyn RegisterValue>> {
        self.values.insert(register, value)
    }

    pub fn get(&self, register: u16) -> Option<&dyn RegisterValue> {
        self.values.get(&register).map(|v| v.as_ref())
    }

    /// Get a value downcast to a concrete type
    pub fn get_as<T: RegisterValue>(&self, register: u16) -> Option<&T> {
        self.get(register)
            .and_then(|v| v.as_any().downcast_ref::<T>())
    }

    pub fn contains(&self, register: u16) -> bool {
        self.values.contains_key(&register)
    }

    pub fn remove(&mut self, register: u16) -> Option<Box<dyn RegisterValue>> {
        self.values.remove(&register)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in ascending register order
    pub fn iter(&self) -> impl Iterator<Item = (u16, &dyn RegisterValue)> {
        self.values.iter().map(|(r, v)| (*r, v.as_ref()))
    }
}

impl FromIterator<(u16, Box<dyn RegisterValue>)> for Registers {
    fn from_iter<I: IntoIterator<Item = (u16, Box<dyn RegisterValue>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
