//! Technical indicators and composite signal generation
//!
//! Pure functions over price series. All indicators return a dense `Vec<f64>`
//! aligned to the end of the input: a series shorter than the minimum length
//! yields an empty vector, never an error. RSI and ATR use Wilder's smoothing
//! (`avg = (avg * (period - 1) + new) / period`) seeded with a simple mean,
//! the same convention as backtrader.

use crate::types::{Candle, IndicatorSnapshot, SignalKind, TradeSignal};

/// RSI lookback used by the composite signal
pub const RSI_PERIOD: usize = 14;
/// Fast EMA lookback used by the composite signal
pub const EMA_FAST_PERIOD: usize = 5;
/// Slow EMA lookback used by the composite signal
pub const EMA_SLOW_PERIOD: usize = 20;
/// ATR lookback used by the composite signal
pub const ATR_PERIOD: usize = 14;
/// Minimum candle history required to evaluate the composite signal
pub const MIN_SIGNAL_CANDLES: usize = 50;

/// RSI oversold threshold (bullish vote below)
const RSI_OVERSOLD: f64 = 30.0;
/// RSI overbought threshold (bearish vote above)
const RSI_OVERBOUGHT: f64 = 70.0;
/// Fraction of cast votes one side must reach for a directional signal
const VOTE_CONFIDENCE_FLOOR: f64 = 0.6;

/// Calculate Simple Moving Average
///
/// Output has length `len - period + 1`; empty if the series is shorter
/// than `period`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut window_sum: f64 = values[..period].iter().sum();
    result.push(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        result.push(window_sum / period as f64);
    }

    result
}

/// Calculate Exponential Moving Average
///
/// Seeded with the SMA of the first `period` values, then
/// `price * k + prev * (1 - k)` with `k = 2 / (period + 1)`. Output has
/// length `len - period + 1`; empty if the series is shorter than `period`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return vec![];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut prev = seed;
    result.push(prev);

    for &price in &values[period..] {
        prev = price * k + prev * (1.0 - k);
        result.push(prev);
    }

    result
}

/// Calculate RSI (Relative Strength Index) with Wilder's smoothing
///
/// Per-step gains and losses over `len - 1` deltas; the first average is the
/// mean of the first `period` values, subsequent averages use Wilder's
/// smoothing. When the average loss is zero the value saturates at exactly
/// 100 rather than dividing by zero. Output has length `len - period`; empty
/// if the series is shorter than `period + 1`.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for w in values.windows(2) {
        let delta = w[1] - w[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    let rsi_from = |avg_gain: f64, avg_loss: f64| -> f64 {
        if avg_loss == 0.0 {
            // No losses in the window: RS is unbounded, RSI saturates
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        }
    };

    let mut result = Vec::with_capacity(values.len() - period);
    result.push(rsi_from(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        result.push(rsi_from(avg_gain, avg_loss));
    }

    result
}

/// Calculate True Range per step
///
/// `max(high - low, |high - prev_close|, |low - prev_close|)` over the
/// `len - 1` steps that have a previous close.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    if high.len() < 2 || high.len() != low.len() || high.len() != close.len() {
        return vec![];
    }

    let mut tr = Vec::with_capacity(high.len() - 1);
    for i in 1..high.len() {
        let hl = high[i] - low[i];
        let hc = (high[i] - close[i - 1]).abs();
        let lc = (low[i] - close[i - 1]).abs();
        tr.push(hl.max(hc).max(lc));
    }

    tr
}

/// Calculate Average True Range (ATR) using Wilder's smoothing
///
/// Seeded with the mean of the first `period` true ranges. Output has length
/// `len - period`; empty if the series is shorter than `period + 1`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    if period == 0
        || high.len() < period + 1
        || high.len() != low.len()
        || high.len() != close.len()
    {
        return vec![];
    }

    let tr = true_range(high, low, close);
    let mut atr_value: f64 = tr[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(tr.len() - period + 1);
    result.push(atr_value);

    for &range in &tr[period..] {
        atr_value = (atr_value * (period - 1) as f64 + range) / period as f64;
        result.push(atr_value);
    }

    result
}

/// Generate the composite trading signal from a candle history
///
/// Requires at least [`MIN_SIGNAL_CANDLES`] candles; shorter histories yield
/// a neutral signal with confidence 0 and no indicator snapshot. Three
/// independent votes are evaluated on the latest indicator values:
///
/// 1. RSI below 30 votes bullish, above 70 votes bearish
/// 2. EMA(5) above EMA(20) votes bullish, below votes bearish
/// 3. price above EMA(20) votes bullish, below votes bearish
///
/// Confidence is the winning side's share of cast votes, scaled to
/// `[0, 100]`. The signal is directional only when confidence reaches 60
/// and that side strictly outnumbers the other.
pub fn generate_signal(candles: &[Candle]) -> TradeSignal {
    if candles.len() < MIN_SIGNAL_CANDLES {
        return TradeSignal::neutral("insufficient data");
    }

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();

    let rsi_series = rsi(&closes, RSI_PERIOD);
    let ema_fast_series = ema(&closes, EMA_FAST_PERIOD);
    let ema_slow_series = ema(&closes, EMA_SLOW_PERIOD);
    let atr_series = atr(&highs, &lows, &closes, ATR_PERIOD);

    let (rsi_now, ema_fast_now, ema_slow_now, atr_now) = match (
        rsi_series.last(),
        ema_fast_series.last(),
        ema_slow_series.last(),
        atr_series.last(),
    ) {
        (Some(&r), Some(&ef), Some(&es), Some(&a)) => (r, ef, es, a),
        _ => return TradeSignal::neutral("indicator warmup incomplete"),
    };

    let price = closes[closes.len() - 1];

    let mut bullish = 0u32;
    let mut bearish = 0u32;
    let mut reasons: Vec<String> = Vec::new();

    if rsi_now < RSI_OVERSOLD {
        bullish += 1;
        reasons.push(format!("RSI {:.1} oversold", rsi_now));
    } else if rsi_now > RSI_OVERBOUGHT {
        bearish += 1;
        reasons.push(format!("RSI {:.1} overbought", rsi_now));
    }

    if ema_fast_now > ema_slow_now {
        bullish += 1;
        reasons.push("EMA5 above EMA20".to_string());
    } else if ema_fast_now < ema_slow_now {
        bearish += 1;
        reasons.push("EMA5 below EMA20".to_string());
    }

    if price > ema_slow_now {
        bullish += 1;
        reasons.push("price above EMA20".to_string());
    } else if price < ema_slow_now {
        bearish += 1;
        reasons.push("price below EMA20".to_string());
    }

    let votes_cast = bullish + bearish;
    let ratio = if votes_cast > 0 {
        bullish.max(bearish) as f64 / votes_cast as f64
    } else {
        0.0
    };

    let kind = if ratio >= VOTE_CONFIDENCE_FLOOR && bullish > bearish {
        SignalKind::Bullish
    } else if ratio >= VOTE_CONFIDENCE_FLOOR && bearish > bullish {
        SignalKind::Bearish
    } else {
        SignalKind::Neutral
    };

    let reason = if reasons.is_empty() {
        "no indicator votes".to_string()
    } else {
        reasons.join(", ")
    };

    TradeSignal {
        kind,
        confidence: ratio * 100.0,
        reason,
        indicators: Some(IndicatorSnapshot {
            rsi: rsi_now,
            ema_fast: ema_fast_now,
            ema_slow: ema_slow_now,
            atr: atr_now,
            price,
        }),
    }
}
