//! End-to-end: raw CSV on disk -> normalized series -> indicators -> simulation.

use std::io::Write;

use backlab_core::data::{DataIngestor, SourceHint};
use backlab_core::domain::Side;
use backlab_core::engine::{run, EngineConfig};
use backlab_core::indicators::compute_all;
use backlab_core::strategy::{ParamSet, StrategyRegistry, StrategyTemplate};

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Flat at 100 for `flat` bars, up 2/bar for `up` bars, then down 3/bar for `down` bars.
fn ramp_closes(flat: usize, up: usize, down: usize) -> Vec<f64> {
    let mut closes = vec![100.0; flat];
    let peak = 100.0 + up as f64 * 2.0;
    closes.extend((1..=up).map(|i| 100.0 + i as f64 * 2.0));
    closes.extend((1..=down).map(|i| peak - i as f64 * 3.0));
    closes
}

/// Write closes as a shuffled-order CSV with the columns a typical export has.
fn write_csv(closes: &[f64]) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "Date,Open,High,Low,Close,Adj Close,Volume").unwrap();
    let base = chrono::NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    // Reverse order: the normalizer must sort.
    for (i, close) in closes.iter().enumerate().rev() {
        let date = base + chrono::Duration::days(i as i64);
        writeln!(
            file,
            "{},{},{},{},{},{},1000",
            date.format("%Y-%m-%d"),
            close,
            close + 1.0,
            close - 1.0,
            close,
            close
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn csv_to_crossover_trades() {
    let closes = ramp_closes(40, 30, 30);
    let file = write_csv(&closes);

    let (series, report) = DataIngestor::new()
        .load(file.path(), &SourceHint::default())
        .unwrap();
    assert_eq!(series.len(), closes.len());
    assert_eq!(report.rows_out, closes.len());
    assert_eq!(series.closes(), closes);

    let registry = StrategyRegistry::with_builtins();
    let template = registry.get("sma_cross").unwrap();
    let params = ParamSet::from_decls(&template.params());
    let trace = run(&series, template.as_ref(), &params, &EngineConfig::default()).unwrap();

    assert_eq!(trace.equity.len(), series.len());
    assert_eq!(trace.fills[0].side, Side::Buy);
    assert_eq!(trace.fills[0].bar_index, 40, "golden cross on the first up bar");
    assert_eq!(trace.fills[0].quantity, 1);
    assert_eq!(trace.round_trips().len(), 1);

    let (entry, exit) = trace.round_trips()[0];
    assert!(exit.bar_index > 70, "death cross only after the decline starts");
    assert!(exit.price > entry.price);
}

#[test]
fn indicator_bundle_matches_declared_specs() {
    let closes = ramp_closes(40, 10, 0);
    let file = write_csv(&closes);
    let (series, _) = DataIngestor::new()
        .load(file.path(), &SourceHint::default())
        .unwrap();

    let registry = StrategyRegistry::with_builtins();
    let template = registry.get("sma_cross").unwrap();
    let params = ParamSet::from_decls(&template.params());
    let bundle = compute_all(&series, &template.indicators(), &params);

    assert!(bundle.warnings.is_empty());
    let ids: Vec<&str> = bundle.series.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["sma_fast", "sma_slow"]);
    assert_eq!(bundle.series[0].points.len(), series.len() - 9);
    assert_eq!(bundle.series[1].points.len(), series.len() - 29);
    assert_eq!(bundle.series[0].label, "Fast SMA");
}

#[test]
fn every_builtin_runs_on_its_defaults() {
    let closes = ramp_closes(60, 40, 40);
    let file = write_csv(&closes);
    let (series, _) = DataIngestor::new()
        .load(file.path(), &SourceHint::default())
        .unwrap();

    let registry = StrategyRegistry::with_builtins();
    for key in registry.keys() {
        let template = registry.get(key).unwrap();
        let params = ParamSet::from_decls(&template.params());
        let trace = run(&series, template.as_ref(), &params, &EngineConfig::default())
            .unwrap_or_else(|e| panic!("{key} failed: {e}"));
        assert_eq!(trace.equity.len(), series.len(), "{key}");
    }
}
