//! Property-based tests for affinity_executor using proptest

use affinity_executor::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

fn strategy_strategy() -> impl Strategy<Value = AffinityStrategy> {
    prop_oneof![
        Just(AffinityStrategy::Hash),
        Just(AffinityStrategy::RoundRobin)
    ]
}

// ============================================================================
// Key stickiness
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every job for a key runs on one thread, in submission order
    #[test]
    fn test_keys_stick_to_one_thread(
        strategy in strategy_strategy(),
        workers in 1usize..6,
        keys in prop::collection::vec("[a-z]{1,6}", 1..40)
    ) {
        let router = AffinityRouter::new(strategy, workers).expect("Failed to create router");
        let seen: Arc<Mutex<Vec<(String, usize, ThreadId)>>> = Arc::new(Mutex::new(Vec::new()));

        for (seq, key) in keys.iter().enumerate() {
            let seen = Arc::clone(&seen);
            let record_key = key.clone();
            let accepted = router.execute(key.clone(), move || {
                seen.lock().push((record_key, seq, thread::current().id()));
                Ok(())
            });
            prop_assert!(accepted);
        }
        prop_assert!(router.shutdown(0).is_empty());

        let seen = seen.lock();
        prop_assert_eq!(seen.len(), keys.len());

        let mut threads: HashMap<&str, ThreadId> = HashMap::new();
        let mut last_seq: HashMap<&str, usize> = HashMap::new();
        for (key, seq, thread_id) in seen.iter() {
            let owner = threads.entry(key.as_str()).or_insert(*thread_id);
            prop_assert_eq!(*owner, *thread_id);
            if let Some(previous) = last_seq.insert(key.as_str(), *seq) {
                prop_assert!(previous < *seq);
            }
        }

        for key in &keys {
            let index = router.worker_for(key).expect("key should be mapped");
            prop_assert!(index < workers);
        }
    }
}

// ============================================================================
// Round-robin arithmetic
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The i-th distinct key lands on worker i % n and the round wraps with it
    #[test]
    fn test_round_robin_wraps(workers in 1usize..8, distinct_keys in 1usize..30) {
        let router = AffinityRouter::new(AffinityStrategy::RoundRobin, workers)
            .expect("Failed to create router");
        prop_assert_eq!(router.round(), -1);

        for key in 0..distinct_keys {
            router.execute(key, || Ok(()));
            // Repeat submissions never advance the round
            router.execute(key, || Ok(()));
            prop_assert_eq!(router.round(), (key % workers) as isize);
        }

        for key in 0..distinct_keys {
            prop_assert_eq!(router.worker_for(&key), Some(key % workers));
        }
        prop_assert_eq!(router.mapped_keys(), distinct_keys);
        router.shutdown(0);
        prop_assert_eq!(router.total_jobs_processed(), 2 * distinct_keys as u64);
    }

    /// Hash assignment never touches the round counter
    #[test]
    fn test_hash_leaves_round_untouched(workers in 1usize..8, distinct_keys in 1usize..30) {
        let router = AffinityRouter::new(AffinityStrategy::Hash, workers)
            .expect("Failed to create router");
        for key in 0..distinct_keys {
            router.execute(key, || Ok(()));
        }
        prop_assert_eq!(router.round(), -1);
        prop_assert!((0..distinct_keys).all(|key| router.worker_for(&key).is_some_and(|i| i < workers)));
        router.shutdown(-1);
    }
}

// ============================================================================
// Shutdown policy conversion
// ============================================================================

proptest! {
    /// Millisecond sign convention
    #[test]
    fn test_shutdown_policy_sign(millis in any::<i64>()) {
        let policy = ShutdownPolicy::from(millis);
        match millis {
            0 => prop_assert_eq!(policy, ShutdownPolicy::WaitIndefinitely),
            m if m > 0 => prop_assert!(matches!(policy, ShutdownPolicy::WaitFor(d) if d.as_millis() == m as u128)),
            _ => prop_assert_eq!(policy, ShutdownPolicy::CancelImmediately),
        }
    }
}
