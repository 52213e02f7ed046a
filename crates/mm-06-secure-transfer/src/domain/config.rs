//! Transfer configuration.

use shared_types::SECOND_MS;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Blocks in flight at once, across all sessions.
    pub max_concurrent_blocks: usize,
    /// Retries after the first attempt of a block.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Bound on the wait for a block acknowledgement.
    pub ack_timeout_ms: u64,
    /// Largest accepted plaintext block.
    pub max_block_size: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_concurrent_blocks: 3,
            max_retries: 3,
            retry_base_delay_ms: SECOND_MS,
            retry_max_delay_ms: 30 * SECOND_MS,
            ack_timeout_ms: 30 * SECOND_MS,
            max_block_size: 64 * 1024 * 1024,
        }
    }
}

impl TransferConfig {
    /// Short delays, small blocks.
    pub fn for_testing() -> Self {
        Self {
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 100,
            ack_timeout_ms: 500,
            max_block_size: 1024 * 1024,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `base × 2^attempt`, capped.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let ms = self
            .retry_base_delay_ms
            .saturating_mul(factor)
            .min(self.retry_max_delay_ms);
        Duration::from_millis(ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}
