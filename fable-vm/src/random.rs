// fable-vm - Random number helpers
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Random helpers for the default chance handlers.

use std::cell::Cell;

// LCG constants (same as used in glibc)
const LCG_MULTIPLIER: u64 = 6364136223846793005;
const LCG_INCREMENT: u64 = 1442695040888963407;

thread_local! {
    /// Persistent RNG state, seeded lazily from system time.
    static RNG_STATE: Cell<u64> = const { Cell::new(0) };
    static RNG_SEEDED: Cell<bool> = const { Cell::new(false) };
}

/// Get the next random u64, advancing the RNG state.
fn next_random_u64() -> u64 {
    RNG_STATE.with(|state| {
        RNG_SEEDED.with(|seeded| {
            if !seeded.get() {
                use std::time::{SystemTime, UNIX_EPOCH};
                let seed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0x5eed);
                state.set(seed | 1);
                seeded.set(true);
            }
            let next = state
                .get()
                .wrapping_mul(LCG_MULTIPLIER)
                .wrapping_add(LCG_INCREMENT);
            state.set(next);
            next
        })
    })
}

/// A uniform double in `[min, max)`.
pub fn random_real(min: f64, max: f64) -> f64 {
    let unit = (next_random_u64() >> 11) as f64 / (1u64 << 53) as f64;
    min + unit * (max - min)
}

/// A uniform integer in `[min, max]`.
pub fn random_int(min: i32, max: i32) -> i32 {
    if min >= max {
        return min;
    }
    let span = (max as i64 - min as i64 + 1) as u64;
    min + (next_random_u64() % span) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_stays_in_range() {
        for _ in 0..1000 {
            let r = random_real(0.0, 1.0);
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_int_stays_in_range() {
        for _ in 0..1000 {
            let r = random_int(-3, 3);
            assert!((-3..=3).contains(&r));
        }
    }

    #[test]
    fn test_degenerate_int_range() {
        assert_eq!(random_int(5, 5), 5);
    }
}
