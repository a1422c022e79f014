//! # Transaction Log
//!
//! A FIFO queue of pending row mutations, dequeued in batches for atomic
//! commit by [`SqlTable::commit`](super::SqlTable::commit). The log is
//! shareable across threads; producers enqueue mutations while one committer
//! drains them.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::Row;

/// One pending mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    Inserted(Row),
    Updated(Row),
    Replaced(Row),
    /// Deletion by bare identifier.
    Deleted(i64),
}

/// Policy flags for one commit batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitFlags {
    /// Put a failed batch back at the front of the log instead of dropping
    /// it.
    pub requeue_on_error: bool,
    /// Swallow the commit error and report -1 instead of surfacing it.
    pub suppress_errors: bool,
}

/// Durable FIFO queue of pending mutations.
#[derive(Debug, Default)]
pub struct TransactionLog {
    queue: Mutex<VecDeque<Transaction>>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserted(&self, row: Row) {
        self.push(Transaction::Inserted(row));
    }

    pub fn updated(&self, row: Row) {
        self.push(Transaction::Updated(row));
    }

    pub fn replaced(&self, row: Row) {
        self.push(Transaction::Replaced(row));
    }

    pub fn deleted(&self, id: i64) {
        self.push(Transaction::Deleted(id));
    }

    pub fn push(&self, transaction: Transaction) {
        self.queue.lock().push_back(transaction);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Dequeues up to `count` transactions in FIFO order.
    pub fn dequeue(&self, count: usize) -> Vec<Transaction> {
        let mut queue = self.queue.lock();
        let take = count.min(queue.len());
        queue.drain(..take).collect()
    }

    /// Puts a failed batch back at the front, preserving its internal order.
    pub fn requeue(&self, batch: Vec<Transaction>) {
        let mut queue = self.queue.lock();
        for transaction in batch.into_iter().rev() {
            queue.push_front(transaction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn row(id: i64) -> Row {
        Row::new(vec![Value::Int64(id)])
    }

    #[test]
    fn dequeue_is_fifo_and_bounded() {
        let log = TransactionLog::new();
        log.inserted(row(1));
        log.updated(row(2));
        log.deleted(3);
        let batch = log.dequeue(2);
        assert_eq!(
            batch,
            vec![Transaction::Inserted(row(1)), Transaction::Updated(row(2))]
        );
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn requeue_restores_order() {
        let log = TransactionLog::new();
        log.deleted(1);
        log.deleted(2);
        log.deleted(3);
        let batch = log.dequeue(2);
        log.requeue(batch);
        assert_eq!(
            log.dequeue(3),
            vec![
                Transaction::Deleted(1),
                Transaction::Deleted(2),
                Transaction::Deleted(3)
            ]
        );
    }
}
