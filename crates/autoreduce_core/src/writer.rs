//! Downstream result writers.

use crate::error::CoreResult;
use crate::types::ReduceKeyHash;
use autoreduce_codec::Value;
use std::collections::BTreeMap;

/// Receiver of reduced output.
///
/// A batch calls the writer only after its transaction committed, so a
/// writer never observes work that was rolled back.
pub trait ResultWriter {
    /// Remove the output for `hash`.
    ///
    /// Must be idempotent and must accept hashes that never had output.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the batch is already committed by then.
    fn retract(&mut self, hash: ReduceKeyHash) -> CoreResult<()>;

    /// Store the reduced output for `hash`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Implementations may fail; the batch is already committed by then.
    fn write(&mut self, hash: ReduceKeyHash, result: &Value) -> CoreResult<()>;
}

/// Result writer keeping reduced output in memory, ordered by hash.
#[derive(Debug, Default, Clone)]
pub struct InMemoryResultStore {
    results: BTreeMap<ReduceKeyHash, Value>,
    retractions: u64,
}

impl InMemoryResultStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output for `hash`, if any.
    pub fn get(&self, hash: ReduceKeyHash) -> Option<&Value> {
        self.results.get(&hash)
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Stored results in hash order.
    pub fn iter(&self) -> impl Iterator<Item = (ReduceKeyHash, &Value)> {
        self.results.iter().map(|(hash, value)| (*hash, value))
    }

    /// Number of `retract` calls received.
    pub fn retractions(&self) -> u64 {
        self.retractions
    }
}

impl ResultWriter for InMemoryResultStore {
    fn retract(&mut self, hash: ReduceKeyHash) -> CoreResult<()> {
        self.retractions += 1;
        self.results.remove(&hash);
        Ok(())
    }

    fn write(&mut self, hash: ReduceKeyHash, result: &Value) -> CoreResult<()> {
        self.results.insert(hash, result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retract_is_idempotent() {
        let mut store = InMemoryResultStore::new();
        let hash = ReduceKeyHash::new(9);

        store.retract(hash).unwrap();
        store.write(hash, &Value::from(1)).unwrap();
        store.retract(hash).unwrap();
        store.retract(hash).unwrap();

        assert!(store.is_empty());
        assert_eq!(store.retractions(), 3);
    }

    #[test]
    fn write_replaces() {
        let mut store = InMemoryResultStore::new();
        let hash = ReduceKeyHash::new(1);
        store.write(hash, &Value::from(1)).unwrap();
        store.write(hash, &Value::from(2)).unwrap();
        assert_eq!(store.get(hash), Some(&Value::from(2)));
        assert_eq!(store.iter().count(), 1);
    }
}
