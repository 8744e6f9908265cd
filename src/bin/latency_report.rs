use hdrhistogram::Histogram;
use std::time::Instant;

use matchbook::events::{MarketData, Request, Side, Symbol};
use matchbook::registry::BookRegistry;

fn main() {
    println!("Preparing Latency Benchmark...");

    // Setup
    // Sized so a book survives even if one side never crosses
    let mut registry = BookRegistry::new(300_000, 4);
    registry.warm_up();

    let mut histogram = Histogram::<u64>::new_with_bounds(1, 100_000, 3).unwrap();

    const ITERATIONS: u64 = 1_000_000;
    let symbols = [
        Symbol::from("AAPL").unwrap(),
        Symbol::from("MSFT").unwrap(),
        Symbol::from("TSLA").unwrap(),
        Symbol::from("AMZN").unwrap(),
    ];

    println!("Running {} iterations...", ITERATIONS);

    let mut events: Vec<MarketData> = Vec::with_capacity(64);
    let mut total_duration = std::time::Duration::new(0, 0);

    for i in 0..ITERATIONS {
        let request = Request::New {
            client_id: 1,
            client_order_id: i,
            symbol: symbols[(i % 4) as usize],
            side: if (i / 4) % 2 == 0 { Side::Buy } else { Side::Sell },
            price: 10_000 + (i % 100),
            qty: 10,
        };

        events.clear();

        // Critical measurement section
        let start = Instant::now();
        std::hint::black_box(registry.process(&request, &mut events)).unwrap();
        let elapsed = start.elapsed();

        histogram.record(elapsed.as_nanos() as u64).unwrap_or(());
        total_duration += elapsed;
    }

    println!("\n=== Latency Report (ns) ===");
    println!("Total Ops:  {}", ITERATIONS);
    println!(
        "Throughput: {:.2} ops/sec",
        ITERATIONS as f64 / total_duration.as_secs_f64()
    );
    println!("---------------------------");
    println!("Min:    {:6} ns", histogram.min());
    println!("P50:    {:6} ns", histogram.value_at_quantile(0.50));
    println!("P90:    {:6} ns", histogram.value_at_quantile(0.90));
    println!("P99:    {:6} ns", histogram.value_at_quantile(0.99));
    println!("P99.9:  {:6} ns", histogram.value_at_quantile(0.999));
    println!("P99.99: {:6} ns", histogram.value_at_quantile(0.9999));
    println!("Max:    {:6} ns", histogram.max());
    println!("---------------------------");

    println!("\nDistribution:");
    for v in histogram.iter_log(100_000, 2.0) {
        let count = v.count_at_value();
        if count > 0 {
            println!("{:6} ns: {:10} count", v.value_iterated_to(), count);
        }
    }
}
