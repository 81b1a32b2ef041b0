//! Benchmarks for the order/fill hot path and the auto-stop sweep.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quantsim_core::domain::{Bar, Bars, ErrorHandlingMode};
use quantsim_core::engine::manager::PositionsManager;
use quantsim_core::indicators::sma;

fn synthetic_bars(n: usize) -> Bars {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let rows = (0..n)
        .map(|i| {
            let px = 100.0 + 20.0 * ((i as f64) * 0.05).sin();
            Bar {
                time: (base + chrono::Duration::days(i as i64))
                    .and_hms_opt(16, 0, 0)
                    .unwrap(),
                open: px,
                high: px + 2.0,
                low: px - 2.0,
                close: px + 1.0,
                volume: 100_000.0,
                open_interest: 0.0,
                extra: None,
            }
        })
        .collect();
    Bars::new("BENCH", rows, ErrorHandlingMode::Fatal).unwrap()
}

fn bench_market_round_trips(c: &mut Criterion) {
    let bars = synthetic_bars(2_000);
    c.bench_function("market_round_trips_2000_bars", |b| {
        b.iter(|| {
            let mut mgr = PositionsManager::new("bench");
            for bar in (0..bars.len()).step_by(2) {
                if bar + 1 >= bars.len() {
                    break;
                }
                let id = mgr
                    .buy_at_market(&bars, bar, 100, "entry")
                    .unwrap()
                    .position_id()
                    .unwrap();
                mgr.sell_at_market(&bars, bar + 1, id, "exit").unwrap();
            }
            black_box(mgr.into_container().len())
        })
    });
}

fn bench_auto_stop_sweep(c: &mut Criterion) {
    let bars = synthetic_bars(2_000);
    c.bench_function("auto_stop_sweep_50_open", |b| {
        b.iter(|| {
            let mut mgr = PositionsManager::new("bench");
            mgr.install_stop_loss(5.0);
            mgr.install_trailing_stop(5.0, 3.0);
            mgr.install_profit_target(8.0);
            for i in 0..50 {
                mgr.buy_at_market(&bars, i, 10, "entry").unwrap();
            }
            for bar in 50..bars.len() {
                mgr.apply_auto_stops(&bars, bar).unwrap();
            }
            black_box(mgr.into_container().iter_closed().count())
        })
    });
}

fn bench_sma(c: &mut Criterion) {
    let bars = synthetic_bars(10_000);
    let closes = bars.close_series();
    c.bench_function("sma_50_over_10000", |b| {
        b.iter(|| black_box(sma(&closes, 50).len()))
    });
}

criterion_group!(
    benches,
    bench_market_round_trips,
    bench_auto_stop_sweep,
    bench_sma
);
criterion_main!(benches);
