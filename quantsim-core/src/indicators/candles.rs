//! Candle-pattern predicates over bars: 1.0 where the pattern holds, 0.0
//! where it does not, NaN where the inputs are undefined.

use crate::domain::Bars;
use crate::domain::Series;

/// 1.0 where the bar closed above its open.
pub fn white_candles(bars: &Bars) -> Series {
    per_bar(bars, |o, _h, _l, c| if c > o { 1.0 } else { 0.0 })
}

/// 1.0 where the bar closed below its open.
pub fn black_candles(bars: &Bars) -> Series {
    per_bar(bars, |o, _h, _l, c| if c < o { 1.0 } else { 0.0 })
}

/// 1.0 where the body is at most `body_pct` percent of the bar's range.
///
/// A bar with zero range counts as a doji.
pub fn doji(bars: &Bars, body_pct: f64) -> Series {
    per_bar(bars, move |o, h, l, c| {
        let range = h - l;
        if range <= 0.0 {
            return 1.0;
        }
        if (c - o).abs() <= range * body_pct / 100.0 {
            1.0
        } else {
            0.0
        }
    })
}

/// 1.0 where a white body engulfs the prior black body.
pub fn bullish_engulfing(bars: &Bars) -> Series {
    engulfing(bars, true)
}

/// 1.0 where a black body engulfs the prior white body.
pub fn bearish_engulfing(bars: &Bars) -> Series {
    engulfing(bars, false)
}

fn engulfing(bars: &Bars, bullish: bool) -> Series {
    let n = bars.len();
    let mut out = vec![f64::NAN; n];
    let open = bars.open_series();
    let close = bars.close_series();
    for i in 1..n {
        let (po, pc) = (open.at(i - 1), close.at(i - 1));
        let (o, c) = (open.at(i), close.at(i));
        if po.is_nan() || pc.is_nan() || o.is_nan() || c.is_nan() {
            continue;
        }
        let hit = if bullish {
            pc < po && c > o && o <= pc && c >= po
        } else {
            pc > po && c < o && o >= pc && c <= po
        };
        out[i] = if hit { 1.0 } else { 0.0 };
    }
    Series::from_vec(out)
}

fn per_bar(bars: &Bars, f: impl Fn(f64, f64, f64, f64) -> f64) -> Series {
    let n = bars.len();
    let open = bars.open_series();
    let high = bars.high_series();
    let low = bars.low_series();
    let close = bars.close_series();
    let values = (0..n)
        .map(|i| {
            let (o, h, l, c) = (open.at(i), high.at(i), low.at(i), close.at(i));
            if o.is_nan() || h.is_nan() || l.is_nan() || c.is_nan() {
                f64::NAN
            } else {
                f(o, h, l, c)
            }
        })
        .collect();
    Series::from_vec(values)
}
