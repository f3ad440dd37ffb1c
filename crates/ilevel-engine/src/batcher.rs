//! Identifier batching for count-limited fetch-by-id queries.

use std::num::NonZeroUsize;

use ilevel_types::window::IdBatch;

/// Default maximum number of ids accepted per fetch-by-id call.
pub const DEFAULT_MAX_ID_BATCH_SIZE: usize = 20_000;

/// Splits id lists into contiguous, order-preserving batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdBatcher {
    max_batch_size: NonZeroUsize,
}

impl IdBatcher {
    #[must_use]
    pub fn new(max_batch_size: NonZeroUsize) -> Self {
        Self { max_batch_size }
    }

    #[must_use]
    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size.get()
    }

    /// Full-size batches first, then one batch with the remainder.
    ///
    /// An input shorter than the limit (including an empty one) comes back
    /// as a single batch equal to the input.
    #[must_use]
    pub fn batch(&self, ids: &[i64]) -> Vec<IdBatch> {
        if ids.len() < self.max_batch_size.get() {
            return vec![IdBatch::new(ids.to_vec())];
        }
        ids.chunks(self.max_batch_size.get())
            .map(|chunk| IdBatch::new(chunk.to_vec()))
            .collect()
    }
}

impl Default for IdBatcher {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_MAX_ID_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN))
    }
}
