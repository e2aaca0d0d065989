//! Performance analytics: a simulation trace in, a rounded summary out.
//!
//! Every metric is a pure function over the equity values or the closed
//! trades. `summarize` never fails; degenerate inputs yield zeros.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use backlab_core::domain::Fill;
use backlab_core::engine::Trace;
use backlab_core::rounding::{money, pct, ratio};

/// Trading days per year.
pub const DAILY_PERIODS_PER_YEAR: f64 = 252.0;
/// Regular-session minutes per trading day.
pub const SESSION_MINUTES: f64 = 390.0;

/// One closed buy -> sell round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub gross_pnl: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    pub net_pnl: f64,
}

impl TradeRecord {
    pub fn from_fills(entry: &Fill, exit: &Fill) -> Self {
        let gross_pnl = (exit.price - entry.price) * entry.quantity as f64;
        let commission = entry.commission + exit.commission;
        Self {
            entry_bar: entry.bar_index,
            exit_bar: exit.bar_index,
            entry_time: entry.timestamp,
            exit_time: exit.timestamp,
            quantity: entry.quantity,
            entry_price: entry.price,
            exit_price: exit.price,
            gross_pnl,
            commission,
            net_pnl: gross_pnl - commission,
        }
    }

    /// Proceeds exceeded cost, net of both commissions.
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub start_cash: f64,
    pub final_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    /// Log return over the whole run.
    pub total_return: f64,
    pub annual_return: f64,
    pub sharpe_ratio: f64,
    /// System quality number over closed-trade net pnl.
    pub sqn: f64,
}

/// Drawdowns in percent (0-100) and in money.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub max_drawdown_pct: f64,
    pub max_drawdown_money: f64,
    pub current_drawdown_pct: f64,
    pub current_drawdown_money: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub total_closed: usize,
    pub won: usize,
    pub lost: usize,
    /// Fraction in [0, 1].
    pub win_rate: f64,
    pub win_rate_pct: f64,
    pub total_net_pnl: f64,
    pub avg_net_pnl: f64,
    pub total_gross_pnl: f64,
    pub avg_gross_pnl: f64,
    pub open_position: bool,
}

/// Rounded analytics for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub performance: PerformanceSummary,
    pub risk: RiskSummary,
    pub trades: TradeSummary,
}

/// Reduce a trace to its summary.
pub fn summarize(trace: &Trace, starting_cash: f64) -> Summary {
    let values = trace.equity_values();
    let start_cash = money(starting_cash);
    let final_value = money(values.last().copied().unwrap_or(starting_cash));
    // Exact by construction: both operands are already rounded.
    let pnl = final_value - start_cash;
    let pnl_pct = if start_cash != 0.0 {
        pct(pnl / start_cash * 100.0)
    } else {
        0.0
    };

    let timestamps: Vec<NaiveDateTime> = trace.equity.iter().map(|p| p.timestamp).collect();
    let periods = periods_per_year(&timestamps);
    let trades = extract_trades(trace);
    let dd = drawdown(&values);

    let performance = PerformanceSummary {
        start_cash,
        final_value,
        pnl,
        pnl_pct,
        total_return: ratio(log_return(start_cash, final_value)),
        annual_return: ratio(annual_return(start_cash, final_value, values.len(), periods)),
        sharpe_ratio: ratio(sharpe_ratio(&values, periods)),
        sqn: ratio(sqn(&trades)),
    };
    let risk = RiskSummary {
        max_drawdown_pct: pct(dd.max_pct),
        max_drawdown_money: money(dd.max_money),
        current_drawdown_pct: pct(dd.current_pct),
        current_drawdown_money: money(dd.current_money),
    };

    Summary {
        performance,
        risk,
        trades: trade_summary(&trades, trace.ends_in_position()),
    }
}

/// Closed round trips of a trace, in order. An open final position is not a trade.
pub fn extract_trades(trace: &Trace) -> Vec<TradeRecord> {
    trace
        .round_trips()
        .into_iter()
        .map(|(entry, exit)| TradeRecord::from_fills(entry, exit))
        .collect()
}

// ─── Individual metric functions ────────────────────────────────────

/// Running drawdown state over an equity curve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Drawdown {
    pub max_pct: f64,
    pub max_money: f64,
    pub current_pct: f64,
    pub current_money: f64,
}

/// Peak-to-date drawdown, tracked across the whole curve.
///
/// Percent and money maxima are tracked independently.
pub fn drawdown(equity: &[f64]) -> Drawdown {
    let mut dd = Drawdown::default();
    let Some(&first) = equity.first() else {
        return dd;
    };
    let mut peak = first;
    for &value in equity {
        peak = peak.max(value);
        dd.current_money = peak - value;
        dd.current_pct = if peak > 0.0 {
            dd.current_money / peak * 100.0
        } else {
            0.0
        };
        dd.max_money = dd.max_money.max(dd.current_money);
        dd.max_pct = dd.max_pct.max(dd.current_pct);
    }
    dd
}

/// Natural log of final / start. Zero when either side is non-positive.
pub fn log_return(start: f64, end: f64) -> f64 {
    if start <= 0.0 || end <= 0.0 {
        return 0.0;
    }
    (end / start).ln()
}

/// Average per-bar log return, compounded over a year.
pub fn annual_return(start: f64, end: f64, bars: usize, periods_per_year: f64) -> f64 {
    if bars == 0 {
        return 0.0;
    }
    let per_bar = log_return(start, end) / bars as f64;
    (per_bar * periods_per_year).exp() - 1.0
}

/// Annualized Sharpe ratio from per-bar simple returns, zero risk-free rate.
///
/// Returns 0.0 with fewer than two returns or zero deviation.
pub fn sharpe_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let returns = bar_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let sd = std_dev(&returns);
    if sd < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / sd * periods_per_year.sqrt()
}

/// sqrt(n) * mean / stdev of trade net pnl. Zero with fewer than two trades.
pub fn sqn(trades: &[TradeRecord]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let pnl: Vec<f64> = trades.iter().map(|t| t.net_pnl).collect();
    let sd = std_dev(&pnl);
    if sd < 1e-15 {
        return 0.0;
    }
    (pnl.len() as f64).sqrt() * mean_f64(&pnl) / sd
}

/// Win rate as a fraction. Zero when nothing closed.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

fn trade_summary(trades: &[TradeRecord], open_position: bool) -> TradeSummary {
    let total_closed = trades.len();
    let won = trades.iter().filter(|t| t.is_winner()).count();
    let total_net: f64 = trades.iter().map(|t| t.net_pnl).sum();
    let total_gross: f64 = trades.iter().map(|t| t.gross_pnl).sum();
    let avg = |total: f64| {
        if total_closed == 0 {
            0.0
        } else {
            total / total_closed as f64
        }
    };
    let rate = win_rate(trades);

    TradeSummary {
        total_closed,
        won,
        lost: total_closed - won,
        win_rate: ratio(rate),
        win_rate_pct: pct(rate * 100.0),
        total_net_pnl: money(total_net),
        avg_net_pnl: money(avg(total_net)),
        total_gross_pnl: money(total_gross),
        avg_gross_pnl: money(avg(total_gross)),
        open_position,
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Periods per year implied by the median bar spacing.
///
/// Daily or slower bars count as 252 per year; intraday bars scale by the
/// 390-minute session.
pub fn periods_per_year(timestamps: &[NaiveDateTime]) -> f64 {
    let mut gaps: Vec<Duration> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    if gaps.is_empty() {
        return DAILY_PERIODS_PER_YEAR;
    }
    gaps.sort();
    let median = gaps[gaps.len() / 2];
    if median >= Duration::hours(20) {
        return DAILY_PERIODS_PER_YEAR;
    }
    let minutes = (median.num_seconds().max(1) as f64) / 60.0;
    DAILY_PERIODS_PER_YEAR * SESSION_MINUTES / minutes
}

/// Per-bar simple returns.
pub fn bar_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
