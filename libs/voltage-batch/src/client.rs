//! Batching register client
//!
//! Owns the transport behind a single mutex. A batch holds the lock for all
//! of its wire operations, so concurrent batches and single reads/writes on
//! the same client serialize instead of interleaving on the link.

use parking_lot::Mutex;
use tracing::debug;

use crate::config::BatchConfig;
use crate::diff::differential_filter;
use crate::error::{BatchError, Result};
use crate::executor::BatchExecutor;
use crate::flat::FlatSpace;
use crate::ops::{Read, ReadOp, Write, WriteOp};
use crate::optimizer::{optimize_reads_with_limit, optimize_writes_with_limit};
use crate::transport::RegisterTransport;
use crate::types::{RegisterType, RegisterValue, Registers};

pub struct BatchClient<T> {
    transport: Mutex<T>,
    config: BatchConfig,
}

impl<T: RegisterTransport> BatchClient<T> {
    /// Client with the protocol ceilings and differential writes enabled
    pub fn new(transport: T) -> Self {
        Self {
            transport: Mutex::new(transport),
            config: BatchConfig::default(),
        }
    }

    pub fn with_config(transport: T, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport: Mutex::new(transport),
            config,
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Read a batch of typed values with as few function 3 calls as possible.
    ///
    /// The result maps each request's register to its decoded value. Fails on
    /// the first validation or transport error; a decode failure is reported
    /// as `InvalidInput` scoped to the offending request.
    pub fn batch_read(&self, requests: &[Read<'_>]) -> Result<Registers> {
        let limit = self.config.max_read_registers;
        let ops = requests
            .iter()
            .map(|request| request.to_op(limit))
            .collect::<Result<Vec<ReadOp>>>()?;
        if ops.is_empty() {
            return Ok(Registers::new());
        }

        let optimized = optimize_reads_with_limit(&ops, limit);
        let chunks = {
            let mut transport = self.transport.lock();
            let mut executor = self.executor(&mut *transport);
            executor.read_all(&optimized)?
        };

        // Lay merged chunks out by register, then re-slice per request
        let mut space = FlatSpace::for_registers();
        for (register, data) in &chunks {
            let copied = space.set_registers(*register, data);
            if copied != data.len() {
                return Err(BatchError::InvalidInput {
                    expected: data.len(),
                    actual: copied,
                }
                .at_register(*register));
            }
        }

        let mut results = Registers::new();
        for request in requests {
            let bytes = space.get_registers(request.register, request.ty.size());
            let value = request
                .ty
                .convert(bytes)
                .map_err(|e| e.at_register(request.register))?;
            results.insert_boxed(request.register, value);
        }

        debug!(
            "Batch read: {} requests in {} ops",
            requests.len(),
            optimized.len()
        );
        Ok(results)
    }

    /// Write a batch of typed values with as few function 16 calls as possible.
    ///
    /// With a `snapshot` (and differential writes enabled in the config),
    /// writes whose bytes already match the snapshot are skipped. The snapshot
    /// must reflect the real slave state. On a transport failure the ops
    /// before the failing one remain applied.
    pub fn batch_write(&self, requests: &[Write], snapshot: Option<&Registers>) -> Result<()> {
        let snapshot = snapshot.filter(|_| self.config.differential_writes);
        let retained = differential_filter(requests, snapshot);

        let limit = self.config.max_write_registers;
        let ops = retained
            .iter()
            .map(|request| request.to_op(limit))
            .collect::<Result<Vec<WriteOp>>>()?;
        if ops.is_empty() {
            debug!("Batch write: nothing to write");
            return Ok(());
        }

        let optimized = optimize_writes_with_limit(&ops, limit);
        {
            let mut transport = self.transport.lock();
            let mut executor = self.executor(&mut *transport);
            executor.write_all(&optimized)?;
        }

        debug!(
            "Batch write: {} of {} requests in {} ops",
            ops.len(),
            requests.len(),
            optimized.len()
        );
        Ok(())
    }

    /// Read one value; the register count comes from the type
    pub fn read(&self, register: u16, ty: &dyn RegisterType) -> Result<Box<dyn RegisterValue>> {
        let op = Read::new(register, ty).to_op(self.config.max_read_registers)?;
        let data = {
            let mut transport = self.transport.lock();
            let mut executor = self.executor(&mut *transport);
            executor.read_all(std::slice::from_ref(&op))?
        };

        let bytes = data.first().map(|(_, bytes)| &bytes[..]).unwrap_or_default();
        ty.convert(bytes).map_err(|e| e.at_register(register))
    }

    /// Write one value; the register count comes from its encoded length
    pub fn write(&self, register: u16, value: &dyn RegisterValue) -> Result<()> {
        let op = WriteOp::with_limit(register, value.to_bytes(), self.config.max_write_registers)?;
        let mut transport = self.transport.lock();
        let mut executor = self.executor(&mut *transport);
        executor.write_all(std::slice::from_ref(&op))
    }

    /// Run `f` against the locked transport, e.g. to reconnect it
    pub fn with_transport<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.transport.lock())
    }

    pub fn into_inner(self) -> T {
        self.transport.into_inner()
    }

    fn executor<'a>(&self, transport: &'a mut T) -> BatchExecutor<'a, T> {
        BatchExecutor::new(transport).with_retry(self.config.retry_failed_ops)
    }
}
