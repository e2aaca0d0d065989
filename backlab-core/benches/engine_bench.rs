//! Criterion benchmarks for the backtest hot paths.
//!
//! Benchmarks:
//! 1. Bar loop (full simulation with a crossover strategy)
//! 2. Indicator precompute (single SMA and the four-kind stack)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use backlab_core::domain::{Bar, BarSeries, PriceField};
use backlab_core::engine::{run, EngineConfig};
use backlab_core::indicators::{Ema, Indicator, Rsi, Sma, Wma};
use backlab_core::strategy::{NullStrategy, ParamSet, SmaCross, StrategyTemplate};

fn make_series(n: usize) -> BarSeries {
    let base = chrono::NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let bars = (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 10.0;
            Bar {
                timestamp: base + chrono::Duration::days(i as i64),
                open: close - 0.3,
                high: close + 1.5,
                low: close - 1.5,
                close,
                volume: 1_000_000.0,
            }
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

fn bench_bar_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bar_loop");
    let config = EngineConfig::default();

    for &bar_count in &[252, 1260, 5000] {
        let series = make_series(bar_count);
        let params = ParamSet::from_decls(&SmaCross.params());

        group.bench_with_input(
            BenchmarkId::new("sma_cross", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| run(black_box(&series), &SmaCross, black_box(&params), &config));
            },
        );
        group.bench_with_input(BenchmarkId::new("null", bar_count), &bar_count, |b, _| {
            b.iter(|| run(black_box(&series), &NullStrategy, &ParamSet::new(), &config));
        });
    }

    group.finish();
}

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicator_precompute");

    for &bar_count in &[252, 1260, 5000] {
        let series = make_series(bar_count);

        let sma = Sma::new(20, PriceField::Close);
        group.bench_with_input(
            BenchmarkId::new("sma_20", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| sma.compute(black_box(series.bars())));
            },
        );

        let stack: Vec<Box<dyn Indicator>> = vec![
            Box::new(Sma::new(50, PriceField::Close)),
            Box::new(Ema::new(20, PriceField::Close)),
            Box::new(Wma::new(20, PriceField::Close)),
            Box::new(Rsi::new(14, PriceField::Close)),
        ];
        group.bench_with_input(
            BenchmarkId::new("four_kinds", bar_count),
            &bar_count,
            |b, _| {
                b.iter(|| {
                    stack
                        .iter()
                        .map(|ind| ind.compute(black_box(series.bars())))
                        .collect::<Vec<_>>()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_bar_loop, bench_indicators);
criterion_main!(benches);
