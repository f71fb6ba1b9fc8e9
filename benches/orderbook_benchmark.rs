use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use matching_engine::domain::order::Order;
use matching_engine::domain::orderbook::{OrderBook, PriceLadder};
use matching_engine::shared::protocol::{Side, TradingPair, DEFAULT_MAX_PRICE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BOOK_LEVELS: u32 = 1000;
const BASE_PRICE: u32 = 50_000;

fn pair() -> TradingPair {
    TradingPair::new("BTC", "USDT")
}

/// One sell order per level
fn prefill<L: PriceLadder>(book: &mut OrderBook<L>) {
    for i in 0..BOOK_LEVELS {
        book.submit(Order::new(i as u64 + 1, Side::Sell, BASE_PRICE + i, 10))
            .unwrap();
    }
}

fn bench_layout<L: PriceLadder>(c: &mut Criterion, name: &str, make: fn() -> OrderBook<L>) {
    let mut group = c.benchmark_group(format!("OrderBook ({})", name));

    group.bench_function("1-to-1 match against a 1000-level book", |b| {
        b.iter_batched(
            || {
                let mut book = make();
                prefill(&mut book);
                book
            },
            |mut book| {
                book.submit(black_box(Order::new(1_000_000, Side::Buy, BASE_PRICE, 10)))
                    .unwrap()
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("sweep 100 levels", |b| {
        b.iter_batched(
            || {
                let mut book = make();
                prefill(&mut book);
                book
            },
            |mut book| {
                book.submit(black_box(Order::new(1_000_000, Side::Buy, BASE_PRICE + 99, 1_000)))
                    .unwrap()
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("rest then cancel", |b| {
        let mut book = make();
        prefill(&mut book);
        let mut id = 10_000_000u64;
        b.iter(|| {
            id += 1;
            book.submit(black_box(Order::new(id, Side::Buy, BASE_PRICE - 10, 5))).unwrap();
            book.cancel(black_box(id)).unwrap()
        });
    });

    group.bench_function("random mixed flow", |b| {
        let mut book = make();
        let mut rng = StdRng::seed_from_u64(7);
        let mut id = 0u64;
        b.iter(|| {
            id += 1;
            let side = if rng.gen::<bool>() { Side::Buy } else { Side::Sell };
            let price = rng.gen_range(BASE_PRICE - 20..=BASE_PRICE + 20);
            let amount = rng.gen_range(1..=10);
            book.submit(black_box(Order::new(id, side, price, amount))).unwrap();
            if id % 4 == 0 {
                book.cancel(rng.gen_range(1..=id)).unwrap();
            }
        });
    });

    group.finish();
}

fn dense_benchmark(c: &mut Criterion) {
    bench_layout(c, "dense", || OrderBook::new(pair(), DEFAULT_MAX_PRICE));
}

fn sparse_benchmark(c: &mut Criterion) {
    bench_layout(c, "sparse", || OrderBook::sparse(pair(), DEFAULT_MAX_PRICE));
}

criterion_group!(benches, dense_benchmark, sparse_benchmark);
criterion_main!(benches);
