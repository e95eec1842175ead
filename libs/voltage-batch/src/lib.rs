//! VoltageEMS Batching Register Client
//!
//! A holding-register client for high-latency links (seconds per round trip)
//! that turns many independent register reads or writes into as few wire
//! operations as the protocol allows. Only function 3 (read holding
//! registers) and function 16 (write multiple registers) are used.
//!
//! # Algorithm
//!
//! 1. Writes only: with a snapshot of known slave values, drop every write
//!    whose register and bytes match the snapshot.
//! 2. Sort operations by register number, ascending.
//! 3. Merge consecutive operations A and B when
//!    `A.register + A.quantity == B.register` and the merged quantity stays
//!    within 2047 registers for reads or 123 for writes.
//! 4. Execute the merged operations in order under one lock, retrying each
//!    failed call once and aborting the batch if the retry fails.
//! 5. Reads only: lay the merged results out in a flat register space and
//!    decode each original request from its own slice.
//!
//! # Example
//!
//! ```
//! use voltage_batch::{BatchClient, MemoryTransport, Read, Write};
//! use voltage_batch::types::{Float32, Float32Type, Uint16, Uint16Type};
//!
//! let client = BatchClient::new(MemoryTransport::new());
//! client
//!     .batch_write(&[Write::new(10, Uint16(7)), Write::new(11, Float32(1.5))], None)
//!     .unwrap();
//!
//! let values = client
//!     .batch_read(&[Read::new(10, &Uint16Type), Read::new(11, &Float32Type)])
//!     .unwrap();
//! assert_eq!(values.get_as::<Float32>(11), Some(&Float32(1.5)));
//! ```

pub mod client;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod flat;
pub mod logging;
pub mod ops;
pub mod optimizer;
pub mod transport;
pub mod types;

// Re-exports
pub use client::BatchClient;
pub use config::BatchConfig;
pub use diff::differential_filter;
pub use error::{BatchError, ErrorKind, OpKind, Result};
pub use executor::BatchExecutor;
pub use flat::FlatSpace;
pub use ops::{Read, ReadOp, Write, WriteOp, MAX_READ_QUANTITY, MAX_WRITE_QUANTITY};
pub use optimizer::{
    optimize_reads, optimize_reads_with_limit, optimize_writes, optimize_writes_with_limit,
};
pub use transport::{MemoryTransport, RegisterTransport, TransportCall};
pub use types::{RegisterType, RegisterValue, Registers};
