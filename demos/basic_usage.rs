//! Basic affinity router usage example
//!
//! Demonstrates key affinity, round-robin assignment, statistics and the
//! shutdown modes.
//!
//! Run with: cargo run --example basic_usage

use affinity_executor::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::init();

    println!("=== Affinity Executor - Basic Usage Example ===\n");

    let router = AffinityRouter::new(AffinityStrategy::RoundRobin, 3)?;
    println!("1. Router started with {} workers", router.num_workers());

    println!("\n2. Submitting jobs for four sports:");
    for (i, sport) in ["hockey", "baseball", "football", "golf"]
        .into_iter()
        .cycle()
        .take(12)
        .enumerate()
    {
        router.execute(sport, move || {
            println!(
                "  Job {:>2} for {:<8} on {:?}",
                i,
                sport,
                thread::current().name().unwrap_or("?")
            );
            thread::sleep(Duration::from_millis(10));
            Ok(())
        });
    }

    println!("\n3. Key assignments:");
    for sport in ["hockey", "baseball", "football", "golf"] {
        println!("   {:<8} -> worker {:?}", sport, router.worker_for(&sport));
    }
    println!("   round counter: {}", router.round());

    // Drain everything that was submitted
    let unexecuted = router.shutdown(ShutdownPolicy::WaitIndefinitely);
    println!("\n4. Shutdown complete, {} jobs never ran", unexecuted.len());

    println!("\n5. Per-worker statistics:");
    for (i, stat) in router.get_stats().iter().enumerate() {
        println!(
            "   Worker {}: {} processed, {} failed, avg time: {:.2}μs",
            i,
            stat.get_jobs_processed(),
            stat.get_jobs_failed(),
            stat.get_average_processing_time_us()
        );
    }

    println!("\n6. Cancelling a backlog:");
    let router = AffinityRouter::new(AffinityStrategy::Hash, 2)?;
    for i in 0..10 {
        router.execute("slow-key", move || {
            thread::sleep(Duration::from_millis(50));
            println!("  slow job {} finished", i);
            Ok(())
        });
    }
    thread::sleep(Duration::from_millis(10));
    let unexecuted = router.shutdown(-1);
    println!("   {} jobs handed back unexecuted", unexecuted.len());
    println!(
        "   submitting after shutdown accepted: {}",
        router.execute("slow-key", || Ok(()))
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
