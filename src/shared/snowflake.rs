//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation. Message ordering within
//! a group is defined by these IDs, assigned at persistence time.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// ChatMe epoch (2020-01-01T00:00:00.000Z)
const CHATME_EPOCH: u64 = 1577836800000;

/// Maximum sequence value per millisecond (12 bits).
const SEQUENCE_MAX: u64 = 0xFFF;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    machine_id: u64,
    node_id: u64,
    state: Mutex<GeneratorState>,
}

/// Timestamp and sequence must advance together; one generator is shared
/// across every connection task, so they live behind a single lock. The
/// lock is only held for the duration of the arithmetic, never across an
/// await.
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self {
            machine_id: machine_id & 0x1F, // 5 bits
            node_id: node_id & 0x1F,       // 5 bits
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // Never hand out an ID from before the last one; if the clock
        // stepped backwards, stay on the last millisecond until real
        // time catches up.
        let mut timestamp = current_timestamp().max(state.last_timestamp);

        if timestamp == state.last_timestamp {
            state.sequence += 1;
            if state.sequence > SEQUENCE_MAX {
                // Sequence exhausted; spin to the next millisecond
                // rather than wrapping into already-minted IDs.
                while timestamp <= state.last_timestamp {
                    timestamp = current_timestamp();
                }
                state.sequence = 0;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = timestamp;

        let id = ((timestamp - CHATME_EPOCH) << 22)
            | (self.machine_id << 17)
            | (self.node_id << 12)
            | state.sequence;

        id as i64
    }
}

/// Get current timestamp in milliseconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}

/// Extract timestamp from snowflake ID
pub fn extract_timestamp(snowflake: i64) -> u64 {
    ((snowflake as u64) >> 22) + CHATME_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_generate_unique() {
        let gen = SnowflakeGenerator::new(1, 1);
        let id1 = gen.generate();
        let id2 = gen.generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_generate_monotonic() {
        let gen = SnowflakeGenerator::new(1, 1);
        let ids: Vec<i64> = (0..100).map(|_| gen.generate()).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_concurrent_generation_yields_unique_ids() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 20_000;

        let gen = Arc::new(SnowflakeGenerator::new(1, 1));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let gen = Arc::clone(&gen);
                thread::spawn(move || {
                    (0..PER_THREAD).map(|_| gen.generate()).collect::<Vec<i64>>()
                })
            })
            .collect();

        let mut seen = HashSet::with_capacity(THREADS * PER_THREAD);
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate snowflake ID {}", id);
            }
        }
        assert_eq!(seen.len(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_sequence_exhaustion_rolls_to_next_millisecond() {
        let gen = SnowflakeGenerator::new(1, 1);
        // Well past 4096 IDs; without the spin-to-next-ms the low 12
        // bits would wrap back onto already-minted values.
        let ids: Vec<i64> = (0..10_000).map(|_| gen.generate()).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_extract_timestamp() {
        let gen = SnowflakeGenerator::new(1, 1);
        let id = gen.generate();
        let ts = extract_timestamp(id);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        assert!(ts <= now);
        assert!(ts > now - 1000); // Within 1 second
    }
}
