//! Error types for voltage-batch

use std::fmt;
use thiserror::Error;

/// Which wire function an operation maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Function 3, read holding registers
    Read,
    /// Function 16, write multiple registers
    Write,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Read => f.write_str("read"),
            OpKind::Write => f.write_str("write"),
        }
    }
}

/// Coarse error classification, stable across message changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TooManyRegisters,
    OddByteNumber,
    InvalidInput,
    Transport,
    Config,
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("too many registers in an operation: {quantity} exceeds {limit}")]
    TooManyRegisters { quantity: usize, limit: u16 },

    #[error("odd bytes number not allowed: {0}")]
    OddByteNumber(usize),

    #[error("invalid byte input: expected {expected} bytes, got {actual}")]
    InvalidInput { expected: usize, actual: usize },

    /// A conversion failure scoped to one request of a batch
    #[error("register {register}: {source}")]
    Request {
        register: u16,
        #[source]
        source: Box<BatchError>,
    },

    /// Transport failure after the retry, `index` is 1-based within the batch
    #[error("{kind} request {index} at {register}: {source}")]
    Transport {
        kind: OpKind,
        index: usize,
        register: u16,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::TooManyRegisters { .. } => ErrorKind::TooManyRegisters,
            BatchError::OddByteNumber(_) => ErrorKind::OddByteNumber,
            BatchError::InvalidInput { .. } => ErrorKind::InvalidInput,
            BatchError::Request { source, .. } => source.kind(),
            BatchError::Transport { .. } => ErrorKind::Transport,
            BatchError::InvalidConfig { .. } | BatchError::Config(_) => ErrorKind::Config,
        }
    }

    /// Scope an error to the request starting at `register`
    pub fn at_register(self, register: u16) -> Self {
        BatchError::Request {
            register,
            source: Box::new(self),
        }
    }

    /// Register of the request or wire operation the error belongs to, if any
    pub fn register(&self) -> Option<u16> {
        match self {
            BatchError::Request { register, .. } | BatchError::Transport { register, .. } => {
                Some(*register)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BatchError>;
