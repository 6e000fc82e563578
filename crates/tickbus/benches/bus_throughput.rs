use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use std::thread;
use tickbus::config::OverflowPolicy;
use tickbus::ring::RingBus;
use tickbus::BusConfig;

const MSG_PER_RUN: u64 = 2_000_000;

fn bench_single_consumer(c: &mut Criterion) {
    let mut group = c.benchmark_group("spmc_single_consumer");
    group.throughput(Throughput::Elements(MSG_PER_RUN));

    group.bench_function("publish_then_poll", |b| {
        b.iter(|| {
            let bus: Arc<RingBus<u64>> = Arc::new(RingBus::new(BusConfig::new(4096, 8)));
            let sub = bus.subscribe(None, OverflowPolicy::Disconnect);

            let producer_bus = bus.clone();
            let producer = thread::spawn(move || {
                for i in 0..MSG_PER_RUN {
                    while !producer_bus.publish(i) {
                        std::hint::spin_loop();
                    }
                }
            });

            let mut consumed = 0u64;
            while consumed < MSG_PER_RUN {
                if let Some(v) = bus.poll(&sub) {
                    black_box(v);
                    consumed += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
            producer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("spmc_fanout");

    for num_consumers in [2, 4, 8].iter() {
        group.throughput(Throughput::Elements(MSG_PER_RUN));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{num_consumers}C")),
            num_consumers,
            |b, &n| {
                b.iter(|| {
                    let bus: Arc<RingBus<u64>> = Arc::new(RingBus::new(BusConfig::new(4096, 32)));
                    let subs: Vec<_> = (0..n)
                        .map(|_| bus.subscribe(None, OverflowPolicy::Disconnect))
                        .collect();

                    let producer_bus = bus.clone();
                    let producer = thread::spawn(move || {
                        for i in 0..MSG_PER_RUN {
                            while !producer_bus.publish(i) {
                                std::hint::spin_loop();
                            }
                        }
                    });

                    let consumers: Vec<_> = subs
                        .into_iter()
                        .map(|sub| {
                            let bus = bus.clone();
                            thread::spawn(move || {
                                let mut consumed = 0u64;
                                while consumed < MSG_PER_RUN {
                                    if let Some(v) = bus.poll(&sub) {
                                        black_box(v);
                                        consumed += 1;
                                    } else {
                                        std::hint::spin_loop();
                                    }
                                }
                            })
                        })
                        .collect();

                    producer.join().unwrap();
                    for c in consumers {
                        c.join().unwrap();
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_single_consumer, bench_fanout);
criterion_main!(benches);
