//! Order sizing and threshold math for the spread-scalping strategy.
//!
//! Pure functions over [`Decimal`], so the clamping and rounding guarantees
//! can be tested exhaustively without any exchange access.

use lens_core::Instrument;
use rust_decimal::{Decimal, RoundingStrategy};

/// Relative spread threshold: 0.02 % of the last price.
const SPREAD_RATIO: Decimal = Decimal::from_parts(2, 0, 0, false, 4);

/// Minimum acceptable spread: `max(floor, last_price × 0.0002)`.
pub fn min_spread(last_price: Decimal, floor: Decimal) -> Decimal {
    (last_price * SPREAD_RATIO).max(floor)
}

/// Minimum acceptable profit for a round trip:
/// `notional × fee_rate × 2 + margin` (the fee is paid on both legs).
pub fn min_profit(last_price: Decimal, qty: Decimal, fee_rate: Decimal, margin: Decimal) -> Decimal {
    last_price * qty * fee_rate * Decimal::TWO + margin
}

/// Compute the order quantity for one trade.
///
/// Starts from `quote_balance × fraction` converted to base units, then
/// clamps into the instrument's feasible band: quantity within
/// `[min_order_qty, max_order_qty]` AND notional within
/// `[min_order_amt, max_order_amt]`, rounded to the instrument's base
/// precision. The band boundaries are rounded inward (lower bound up, upper
/// bound down), so the returned quantity always satisfies all four limits.
///
/// Returns `None` when no quantity can satisfy the limits (e.g. the minimum
/// notional at the current price already exceeds the maximum quantity) — the
/// caller must not place an order in that case.
pub fn order_quantity(
    instrument: &Instrument,
    last_price: Decimal,
    quote_balance: Decimal,
    fraction: Decimal,
) -> Option<Decimal> {
    if last_price <= Decimal::ZERO {
        return None;
    }
    let places = instrument.base_precision_places();

    let lower = instrument
        .min_order_qty
        .max(instrument.min_order_amt / last_price)
        .round_dp_with_strategy(places, RoundingStrategy::ToPositiveInfinity);
    let upper = instrument
        .max_order_qty
        .min(instrument.max_order_amt / last_price)
        .round_dp_with_strategy(places, RoundingStrategy::ToZero);

    if lower > upper || lower <= Decimal::ZERO {
        return None;
    }

    let target = (quote_balance * fraction / last_price)
        .round_dp_with_strategy(places, RoundingStrategy::ToZero);

    Some(target.clamp(lower, upper))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lens_core::Category;

    fn instrument(
        min_qty: &str,
        max_qty: &str,
        min_amt: &str,
        max_amt: &str,
        precision: &str,
    ) -> Instrument {
        Instrument {
            symbol: "BTCUSDT".into(),
            category: Category::Spot,
            base_coin: "BTC".into(),
            quote_coin: "USDT".into(),
            status: "Trading".into(),
            base_precision: precision.parse().unwrap(),
            quote_precision: "0.01".parse().unwrap(),
            min_order_qty: min_qty.parse().unwrap(),
            max_order_qty: max_qty.parse().unwrap(),
            min_order_amt: min_amt.parse().unwrap(),
            max_order_amt: max_amt.parse().unwrap(),
            tick_size: "0.1".parse().unwrap(),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    /// The §sizing guarantee: any returned quantity satisfies all four
    /// instrument limits.
    fn assert_feasible(inst: &Instrument, price: Decimal, qty: Decimal) {
        assert!(qty >= inst.min_order_qty, "qty {qty} below min qty");
        assert!(qty <= inst.max_order_qty, "qty {qty} above max qty");
        assert!(qty * price >= inst.min_order_amt, "notional below min");
        assert!(qty * price <= inst.max_order_amt, "notional above max");
    }

    #[test]
    fn nominal_sizing_takes_the_balance_fraction() {
        let inst = instrument("0.00004", "500", "1", "2000000", "0.000001");
        let price = dec("30000");
        // 10% of 3000 USDT → 300 USDT → 0.01 BTC.
        let qty = order_quantity(&inst, price, dec("3000"), dec("0.1")).unwrap();
        assert_eq!(qty, dec("0.010000"));
        assert_feasible(&inst, price, qty);
    }

    #[test]
    fn tiny_balance_is_lifted_to_the_feasible_floor() {
        let inst = instrument("0.00004", "500", "10", "2000000", "0.000001");
        let price = dec("30000");
        // 10% of 5 USDT → far below the 10 USDT min notional.
        let qty = order_quantity(&inst, price, dec("5"), dec("0.1")).unwrap();
        assert_feasible(&inst, price, qty);
        // Lifted to exactly the (rounded-up) min-notional quantity.
        assert_eq!(qty, dec("0.000334"));
    }

    #[test]
    fn huge_balance_is_capped_at_the_feasible_ceiling() {
        let inst = instrument("0.00004", "2", "1", "30000", "0.000001");
        let price = dec("30000");
        // 10% of 10M USDT → 33 BTC, above both max qty and max notional.
        let qty = order_quantity(&inst, price, dec("10000000"), dec("0.1")).unwrap();
        assert_feasible(&inst, price, qty);
        // Max notional 30000 / price 30000 → 1 BTC binds before max qty 2.
        assert_eq!(qty, dec("1"));
    }

    #[test]
    fn infeasible_band_returns_none() {
        // Min notional needs 10 BTC at this price, but max qty is 1 BTC.
        let inst = instrument("0.001", "1", "10000", "2000000", "0.001");
        assert_eq!(order_quantity(&inst, dec("1000"), dec("100000"), dec("0.1")), None);
    }

    #[test]
    fn rounding_never_exits_the_band() {
        // Coarse precision: whole units only, narrow notional band.
        let inst = instrument("1", "100", "95", "105", "1");
        let price = dec("10");
        // Band in qty: [9.5, 10.5] → rounded inward to [10, 10].
        let qty = order_quantity(&inst, price, dec("1"), dec("0.1")).unwrap();
        assert_eq!(qty, dec("10"));
        assert_feasible(&inst, price, qty);

        // Shrink the band so that inward rounding empties it: [9.51, 9.99].
        let inst = instrument("1", "100", "95.1", "99.9", "1");
        assert_eq!(order_quantity(&inst, price, dec("1000"), dec("0.1")), None);
    }

    #[test]
    fn zero_or_negative_price_is_rejected() {
        let inst = instrument("0.001", "500", "1", "2000000", "0.001");
        assert_eq!(order_quantity(&inst, Decimal::ZERO, dec("1000"), dec("0.1")), None);
    }

    #[test]
    fn min_spread_applies_the_floor() {
        // 0.02% of 30000 = 6 → scaled value wins over floor 1.
        assert_eq!(min_spread(dec("30000"), dec("1")), dec("6.0000"));
        // 0.02% of 100 = 0.02 → floor 1 wins.
        assert_eq!(min_spread(dec("100"), dec("1")), dec("1"));
    }

    #[test]
    fn min_profit_covers_both_legs_plus_margin() {
        // 30000 × 0.01 × 0.001 × 2 + 0.1 = 0.7
        let profit = min_profit(dec("30000"), dec("0.01"), dec("0.001"), dec("0.1"));
        assert_eq!(profit, dec("0.7000"));
    }
}
