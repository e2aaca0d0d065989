//! Single-position fill accounting.
//!
//! Orders fill at the bar close. Commission is `rate * notional` on both sides.

use crate::domain::{Account, Bar, Fill, Position, Side};
use crate::strategy::Sizing;

/// Whole units to buy: floor(cash * fraction / price), at least one.
pub fn order_size(cash: f64, price: f64, sizing: Sizing) -> u64 {
    let raw = match sizing {
        Sizing::Units(n) => n,
        Sizing::CashFraction(fraction) => {
            let units = (cash * fraction / price).floor();
            if units.is_finite() && units > 0.0 {
                units as u64
            } else {
                0
            }
        }
    };
    raw.max(1)
}

/// Open a long position at the bar close.
///
/// Returns `None` (and leaves the account untouched) when the account is not
/// flat or cannot pay for the units plus commission.
pub fn buy(account: &mut Account, bar_index: usize, bar: &Bar, sizing: Sizing) -> Option<Fill> {
    if !account.is_flat() {
        return None;
    }
    let quantity = order_size(account.cash, bar.close, sizing);
    let notional = quantity as f64 * bar.close;
    let commission = notional * account.commission_rate;
    if notional + commission > account.cash {
        return None;
    }

    account.cash -= notional + commission;
    account.position = Position {
        quantity,
        entry_price: bar.close,
    };
    Some(Fill {
        bar_index,
        timestamp: bar.timestamp,
        side: Side::Buy,
        price: bar.close,
        quantity,
        commission,
    })
}

/// Liquidate the whole position at the bar close. `None` when already flat.
pub fn sell(account: &mut Account, bar_index: usize, bar: &Bar) -> Option<Fill> {
    if account.is_flat() {
        return None;
    }
    let quantity = account.position.quantity;
    let notional = quantity as f64 * bar.close;
    let commission = notional * account.commission_rate;

    account.cash += notional - commission;
    account.position = Position::flat();
    Some(Fill {
        bar_index,
        timestamp: bar.timestamp,
        side: Side::Sell,
        price: bar.close,
        quantity,
        commission,
    })
}
