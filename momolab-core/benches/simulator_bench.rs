//! Criterion benchmarks for MomoLab hot paths.
//!
//! Benchmarks:
//! 1. Full simulation over a multi-year panel
//! 2. Schedule construction with calendar mapping
//! 3. Realized-vol precompute for the vol-trigger policy

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use momolab_core::data::{PricePanel, PriceRow, SignalRow, SignalSchedule};
use momolab_core::engine::{ExposureConfig, SimConfig, Simulator};

// ── Helpers ──────────────────────────────────────────────────────────

fn calendar(days: usize) -> Vec<NaiveDate> {
    let base = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    (0..days as i64).map(|i| base + Duration::days(i)).collect()
}

fn make_panel(days: usize, symbols: usize) -> PricePanel {
    let mut rows = Vec::with_capacity(days * symbols);
    for s in 0..symbols {
        for (i, date) in calendar(days).into_iter().enumerate() {
            let close = 100.0 + ((i + s * 7) as f64 * 0.05).sin() * 10.0 + s as f64;
            rows.push(PriceRow::close_only(date, format!("SYM{s:03}"), close));
        }
    }
    PricePanel::from_rows(rows).unwrap()
}

/// Weekly signals with a rotating ranking.
fn make_signals(days: usize, symbols: usize, window: usize) -> Vec<SignalRow> {
    let mut rows = Vec::new();
    for (week, date) in calendar(days).into_iter().step_by(7).enumerate() {
        for r in 0..window.min(symbols) {
            let s = (week * 3 + r) % symbols;
            rows.push(SignalRow::new(date, format!("SYM{s:03}"), r as u32 + 1));
        }
    }
    rows
}

// ── 1. Simulation ────────────────────────────────────────────────────

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation");
    group.sample_size(20);

    for &days in &[252, 1260] {
        let panel = make_panel(days, 100);
        let signals = make_signals(days, 100, 40);
        let schedule = SignalSchedule::mapped_to_calendar(&signals, panel.dates(), 25, 10);

        for exposure in [ExposureConfig::Baseline, ExposureConfig::vol_trigger(63, 0.15)] {
            let cfg = SimConfig {
                top_n: 25,
                exit_buffer: 10,
                exposure: exposure.clone(),
                ..SimConfig::default()
            };
            let sim = Simulator::new(cfg).unwrap();
            group.bench_with_input(
                BenchmarkId::new(exposure.label(), days),
                &days,
                |b, _| b.iter(|| sim.run(black_box(&panel), black_box(&schedule), None)),
            );
        }
    }

    group.finish();
}

// ── 2. Schedule ──────────────────────────────────────────────────────

fn bench_schedule(c: &mut Criterion) {
    let panel = make_panel(1260, 10);
    let signals = make_signals(1260, 500, 50);
    c.bench_function("schedule_mapped_1260_days_500_symbols", |b| {
        b.iter(|| SignalSchedule::mapped_to_calendar(black_box(&signals), panel.dates(), 25, 25))
    });
}

// ── 3. Realized Vol ──────────────────────────────────────────────────

fn bench_realized_vol(c: &mut Criterion) {
    let panel = make_panel(1260, 100);
    c.bench_function("mean_realized_vol_63", |b| {
        b.iter(|| panel.mean_realized_vol(black_box(63)))
    });
}

criterion_group!(benches, bench_simulation, bench_schedule, bench_realized_vol);
criterion_main!(benches);
