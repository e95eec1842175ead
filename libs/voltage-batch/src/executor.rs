//! Sequential batch executor
//!
//! Issues an optimized op sequence strictly in order. Each wire call gets one
//! retry with identical arguments; if the retry fails too the batch aborts at
//! that op. Ops that already succeeded stay applied on the slave, there is no
//! rollback.
//!
//! The executor borrows the transport mutably, so whoever holds that borrow
//! (the client's lock guard) holds it for the whole batch.

use anyhow::bail;
use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::error::{BatchError, OpKind, Result};
use crate::ops::{ReadOp, WriteOp, REGISTER_BYTES};
use crate::transport::RegisterTransport;

pub struct BatchExecutor<'a, T: RegisterTransport + ?Sized> {
    transport: &'a mut T,
    retry: bool,
}

impl<'a, T: RegisterTransport + ?Sized> BatchExecutor<'a, T> {
    pub fn new(transport: &'a mut T) -> Self {
        Self {
            transport,
            retry: true,
        }
    }

    /// Enable or disable the single retry after a failed call
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    /// Execute reads in order, returning each op's data keyed by its starting register
    pub fn read_all(&mut self, ops: &[ReadOp]) -> Result<Vec<(u16, Bytes)>> {
        let mut results = Vec::with_capacity(ops.len());
        for (i, op) in ops.iter().enumerate() {
            let data = self
                .read(op)
                .map_err(|source| abort(OpKind::Read, i + 1, op.register, source))?;
            results.push((op.register, data));
        }
        Ok(results)
    }

    /// Execute writes in order, stopping at the first op that fails twice
    pub fn write_all(&mut self, ops: &[WriteOp]) -> Result<()> {
        for (i, op) in ops.iter().enumerate() {
            self.write(op)
                .map_err(|source| abort(OpKind::Write, i + 1, op.register, source))?;
        }
        Ok(())
    }

    /// Single read through the same retry path
    pub fn read(&mut self, op: &ReadOp) -> anyhow::Result<Bytes> {
        let expected = usize::from(op.quantity) * REGISTER_BYTES;
        self.attempt(OpKind::Read, op.register, |transport| {
            let data = transport.read_holding_registers(op.register, op.quantity)?;
            if data.len() != expected {
                bail!(
                    "response length mismatch: expected {} bytes, got {}",
                    expected,
                    data.len()
                );
            }
            debug!("FC03 {} x{}: {}B", op.register, op.quantity, data.len());
            Ok(data)
        })
    }

    /// Single write through the same retry path
    pub fn write(&mut self, op: &WriteOp) -> anyhow::Result<()> {
        self.attempt(OpKind::Write, op.register, |transport| {
            transport.write_multiple_registers(op.register, op.quantity, &op.value)?;
            debug!("FC16 {} x{}: {}B", op.register, op.quantity, op.value.len());
            Ok(())
        })
    }

    fn attempt<R>(
        &mut self,
        kind: OpKind,
        register: u16,
        mut call: impl FnMut(&mut T) -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        match call(&mut *self.transport) {
            Ok(result) => Ok(result),
            Err(e) if self.retry => {
                warn!("{} at {} failed, retrying: {}", kind, register, e);
                call(&mut *self.transport)
            }
            Err(e) => Err(e),
        }
    }
}

fn abort(kind: OpKind, index: usize, register: u16, source: anyhow::Error) -> BatchError {
    error!("{} request {} at {} failed, batch aborted: {}", kind, index, register, source);
    BatchError::Transport {
        kind,
        index,
        register,
        source,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::transport::{MemoryTransport, TransportCall};
    use tracing_test::traced_test;

    fn r(register: u16, quantity: u16) -> ReadOp {
        ReadOp { register, quantity }
    }

    /// Transport that answers reads with a fixed (possibly wrong-sized) payload
    struct ShortReads;

    impl RegisterTransport for ShortReads {
        fn read_holding_registers(&mut self, _: u16, _: u16) -> anyhow::Result<Bytes> {
            Ok(Bytes::from_static(&[1]))
        }

        fn write_multiple_registers(
            &mut self,
            _: u16,
            _: u16,
            _: &[u8],
        ) -> anyhow::Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    #[test]
    fn test_reads_in_order() {
        let mut slave = MemoryTransport::new();
        slave.set_registers(10, &[1, 2]);
        slave.set_registers(50, &[5]);

        let results = BatchExecutor::new(&mut slave)
            .read_all(&[r(10, 2), r(50, 1)])
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 10);
        assert_eq!(&results[0].1[..], &[0, 1, 0, 2]);
        assert_eq!(results[1].0, 50);
        assert_eq!(&results[1].1[..], &[0, 5]);
    }

    #[test]
    fn test_single_failure_is_retried() {
        let mut slave = MemoryTransport::new();
        slave.fail_at(10, 1);

        let results = BatchExecutor::new(&mut slave).read_all(&[r(10, 1)]).unwrap();
        assert_eq!(results.len(), 1);
        // Identical arguments on the retry
        assert_eq!(
            slave.calls(),
            &[
                TransportCall::Read {
                    register: 10,
                    quantity: 1
                },
                TransportCall::Read {
                    register: 10,
                    quantity: 1
                },
            ]
        );
    }

    #[test]
    fn test_double_failure_aborts_remaining_ops() {
        let mut slave = MemoryTransport::new();
        slave.fail_at(20, 2);

        let ops = [
            WriteOp::new(10, vec![0, 1]).unwrap(),
            WriteOp::new(20, vec![0, 2]).unwrap(),
            WriteOp::new(30, vec![0, 3]).unwrap(),
        ];
        let err = BatchExecutor::new(&mut slave).write_all(&ops).unwrap_err();

        match err {
            BatchError::Transport {
                kind,
                index,
                register,
                ..
            } => {
                assert_eq!(kind, OpKind::Write);
                assert_eq!(index, 2);
                assert_eq!(register, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
        // First op stays applied, third never issued
        assert_eq!(slave.register(10), 1);
        assert_eq!(slave.register(30), 0);
        assert_eq!(slave.calls().len(), 3);
    }

    #[test]
    #[traced_test]
    fn test_retry_and_abort_are_logged() {
        let mut slave = MemoryTransport::new();
        slave.fail_at(10, 2);

        let _ = BatchExecutor::new(&mut slave).read_all(&[r(10, 1)]);
        assert!(logs_contain("read at 10 failed, retrying"));
        assert!(logs_contain("read request 1 at 10 failed, batch aborted"));
    }

    #[test]
    fn test_retry_disabled() {
        let mut slave = MemoryTransport::new();
        slave.fail_at(10, 1);

        let err = BatchExecutor::new(&mut slave)
            .with_retry(false)
            .read_all(&[r(10, 1)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(slave.calls().len(), 1);
    }

    #[test]
    fn test_short_response_counts_as_failure() {
        let mut transport = ShortReads;
        let err = BatchExecutor::new(&mut transport)
            .read_all(&[r(0, 2)])
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("response length mismatch"));
    }

    #[test]
    fn test_empty_batch_issues_nothing() {
        let mut slave = MemoryTransport::new();
        let mut executor = BatchExecutor::new(&mut slave);
        assert!(executor.read_all(&[]).unwrap().is_empty());
        executor.write_all(&[]).unwrap();
        assert!(slave.calls().is_empty());
    }
}
