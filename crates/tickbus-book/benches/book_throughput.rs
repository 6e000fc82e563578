use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tickbus_book::{CompositeTopOfBook, TickBook, TickBookConfig};
use tickbus_core::{
    BookUpdate, InstrumentKind, Level, LevelSet, Price, Quantity, SymbolInfo, SymbolRegistry,
    UpdateKind, VenueId,
};

const UPDATES_PER_RUN: u64 = 200_000;

fn snapshot_update() -> BookUpdate {
    let mut bids = LevelSet::empty();
    let mut asks = LevelSet::empty();
    for i in 0..10 {
        bids.push(Level {
            price: Price::from_parts(100 - i, 0),
            qty: Quantity::from_parts(1, 0),
        });
        asks.push(Level {
            price: Price::from_parts(101 + i, 0),
            qty: Quantity::from_parts(1, 0),
        });
    }
    BookUpdate {
        symbol: tickbus_core::SymbolId::placeholder(),
        kind: UpdateKind::Snapshot,
        bids,
        asks,
        source_venue: 0,
        exchange_ts_ns: 0,
        local_ts_ns: 0,
    }
}

fn bench_apply_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_book_apply_update");
    group.throughput(Throughput::Elements(UPDATES_PER_RUN));

    group.bench_function("snapshot_then_deltas", |b| {
        b.iter(|| {
            let mut book = TickBook::new(TickBookConfig::new(4096, 1));
            let snapshot = snapshot_update();
            for i in 0..UPDATES_PER_RUN {
                let mut update = snapshot.clone();
                update.kind = UpdateKind::Delta;
                update.bids.clear();
                update.bids.push(Level {
                    price: Price::from_parts((i % 4096) as i64, 0),
                    qty: Quantity::from_parts(1, 0),
                });
                book.apply_update(black_box(&update));
            }
            black_box(book.best_bid());
        });
    });

    group.finish();
}

fn bench_composite_update_top(c: &mut Criterion) {
    let mut group = c.benchmark_group("composite_top_of_book");

    for num_venues in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(UPDATES_PER_RUN));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_venues}V")),
            num_venues,
            |b, &num_venues| {
                let registry = SymbolRegistry::new();
                let symbol = registry
                    .register_symbol(SymbolInfo {
                        venue: VenueId(0),
                        instrument: "BTC-USD".to_string(),
                        instrument_kind: InstrumentKind::Spot,
                        tick_size_raw: 1,
                        option_meta: None,
                    })
                    .unwrap();

                b.iter(|| {
                    let composite = CompositeTopOfBook::new(1, num_venues);
                    for i in 0..UPDATES_PER_RUN {
                        let venue = VenueId((i % num_venues as u64) as u16);
                        composite.update_top(
                            symbol,
                            venue,
                            Some((Price::from_parts(100, 0), Quantity::from_parts(1, 0))),
                            Some((Price::from_parts(101, 0), Quantity::from_parts(1, 0))),
                            i,
                        );
                    }
                    black_box(composite.best_bid(symbol));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_apply_update, bench_composite_update_top);
criterion_main!(benches);
