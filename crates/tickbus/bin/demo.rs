//! Demonstration of the pool-backed SPMC bus.
//!
//! Run with: `cargo run -p tickbus --bin demo`

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tickbus::{Bus, BusConfig, OverflowPolicy, Pool};
use tickbus_core::{
    InstrumentKind, Lifecycle, Price, Quantity, SubscriberId, Subscriber, SymbolId, Trade,
};

struct PrintingSubscriber {
    id: SubscriberId,
    seen: Arc<AtomicU32>,
}

impl Subscriber for PrintingSubscriber {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn on_trade(&mut self, trade: &Trade) {
        self.seen.fetch_add(1, Ordering::Relaxed);
        println!("subscriber {:?} saw trade {:?}", self.id, trade.symbol);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    println!("=== tickbus demo ===\n");

    let pool: Pool<tickbus_core::BookUpdate> = Pool::new(256);
    println!("book update pool capacity: {}", pool.capacity());

    let mut bus: Bus<Trade> = Bus::new(BusConfig::new(1024, 8));
    let seen = Arc::new(AtomicU32::new(0));

    bus.subscribe(
        Box::new(PrintingSubscriber {
            id: SubscriberId(1),
            seen: seen.clone(),
        }),
        None,
        Some(OverflowPolicy::Disconnect),
        None,
    )
    .expect("subscription");
    bus.start();

    let symbol = SymbolId::placeholder();
    for i in 0..5u64 {
        bus.publish(Trade {
            symbol,
            instrument_kind: InstrumentKind::Spot,
            price: Price::from_parts(100 + i as i64, 0),
            qty: Quantity::from_parts(1, 0),
            taker_is_buy: i % 2 == 0,
            exchange_ts_ns: i,
            source_venue: 0,
        });
    }

    let deadline = Instant::now() + Duration::from_millis(500);
    while seen.load(Ordering::Relaxed) < 5 && Instant::now() < deadline {
        std::thread::yield_now();
    }

    println!("\nbus metrics: {:?}", bus.metrics());
    println!("=== done ===");
}
