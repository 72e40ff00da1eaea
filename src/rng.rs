//! Seed resolution for the engine's single process-wide RNG (spec section
//! 5: "a single process-wide RNG whose seed must be configurable").

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns `seed` unchanged if given, otherwise derives one from the
/// current time and logs it so an unseeded run can still be reproduced by
/// passing `--seed` with the logged value on a rerun.
pub fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(s) => s,
        None => {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("system clock is before the Unix epoch")
                .as_nanos() as u64;
            tracing::info!(seed = nanos, "no --seed given; using a time-derived seed");
            nanos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_seed_is_passed_through() {
        assert_eq!(resolve_seed(Some(42)), 42);
    }

    #[test]
    fn missing_seed_is_derived_and_nonzero_with_overwhelming_probability() {
        let a = resolve_seed(None);
        let b = resolve_seed(None);
        // Not a correctness guarantee (time could in principle repeat), but
        // any real invocation separated by actual wall-clock work will not
        // collide.
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }
}
