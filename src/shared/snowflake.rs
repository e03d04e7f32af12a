//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default epoch (2020-01-01T00:00:00.000Z)
pub const DEFAULT_EPOCH: u64 = 1577836800000;

/// Snowflake ID generator
///
/// Layout: 41 bits timestamp, 10 bits machine id, 12 bits sequence.
pub struct SnowflakeGenerator {
    machine_id: u64,
    epoch: u64,
    /// Packed issue state: millisecond timestamp << 12 | last sequence
    state: AtomicU64,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, epoch: u64) -> Self {
        Self {
            machine_id: machine_id & 0x3FF, // 10 bits
            epoch,
            state: AtomicU64::new(0),
        }
    }

    /// Generate a new snowflake ID
    ///
    /// Ids are strictly increasing per generator. When one millisecond's
    /// 4096 sequence numbers are exhausted, generation spins until the
    /// clock reaches the next millisecond.
    pub fn generate(&self) -> i64 {
        loop {
            let state = self.state.load(Ordering::SeqCst);
            let last = state >> 12;
            let sequence = state & 0xFFF;

            // Never step backwards, even if the wall clock does
            let now = self.current_timestamp().max(last);
            let (timestamp, next_sequence) = if now == last {
                if sequence == 0xFFF {
                    std::hint::spin_loop();
                    continue;
                }
                (last, sequence + 1)
            } else {
                (now, 0)
            };

            let next_state = (timestamp << 12) | next_sequence;
            if self
                .state
                .compare_exchange(state, next_state, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                let id = ((timestamp - self.epoch) << 22)
                    | (self.machine_id << 12)
                    | next_sequence;
                return id as i64;
            }
        }
    }

    /// Extract the millisecond timestamp a generated ID encodes.
    pub fn timestamp_of(&self, snowflake: i64) -> u64 {
        ((snowflake as u64) >> 22) + self.epoch
    }

    /// Get current timestamp in milliseconds
    fn current_timestamp(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards")
            .as_millis() as u64
    }
}

/// Extract timestamp from a snowflake ID minted against the default epoch
pub fn extract_timestamp(snowflake: i64) -> u64 {
    ((snowflake as u64) >> 22) + DEFAULT_EPOCH
}
