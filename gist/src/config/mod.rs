//! Configuration for a tree instance.

use crate::pool::DEFAULT_MAX_IDLE_PER_SIZE;
use serde::Deserialize;

/// Tuning knobs for [`crate::Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Idle transient buffers kept per size class.
    pub pool_max_idle_per_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_size: DEFAULT_MAX_IDLE_PER_SIZE,
        }
    }
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool_max_idle_per_size(mut self, max: usize) -> Self {
        self.pool_max_idle_per_size = max;
        self
    }
}
