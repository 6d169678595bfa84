//! Index configuration.

/// Configuration for creating or opening an index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Largest number of items accepted in one batch.
    pub max_batch_size: usize,

    /// Whether each batch reduces the buckets it touched and writes the
    /// results before returning. When off, only retractions are emitted and
    /// results are produced by an explicit full reduce.
    pub reduce_after_batch: bool,

    /// Whether to sync the commit log on every batch commit.
    pub sync_on_commit: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 16 * 1024,
            reduce_after_batch: true,
            sync_on_commit: true,
        }
    }
}

impl IndexConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest accepted batch.
    #[must_use]
    pub const fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets whether batches reduce touched buckets.
    #[must_use]
    pub const fn reduce_after_batch(mut self, value: bool) -> Self {
        self.reduce_after_batch = value;
        self
    }

    /// Sets whether to sync the commit log on every batch.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = IndexConfig::default();
        assert!(config.reduce_after_batch);
        assert!(config.sync_on_commit);
        assert!(config.max_batch_size > 0);
    }

    #[test]
    fn builder_pattern() {
        let config = IndexConfig::new()
            .max_batch_size(8)
            .reduce_after_batch(false)
            .sync_on_commit(false);

        assert_eq!(config.max_batch_size, 8);
        assert!(!config.reduce_after_batch);
        assert!(!config.sync_on_commit);
    }
}
