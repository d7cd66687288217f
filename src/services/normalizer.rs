//! Provider payload to canonical candle conversion.
//!
//! Rows with a non-numeric time, open, high, low or volume are dropped. A
//! missing or non-numeric close fails the whole payload. Output is sorted by
//! open time with duplicates collapsed to the last occurrence.

use crate::error::{FetchError, Result};
use crate::sources::{PayloadSchema, RawPayload};
use crate::types::{Candle, Timeframe};
use serde_json::Value;
use tracing::debug;

/// Convert a raw provider payload into ordered candles.
pub fn normalize(payload: &RawPayload) -> Result<Vec<Candle>> {
    let provider = payload.source.as_str();
    let mut candles = match payload.schema {
        PayloadSchema::BinanceKlines => rows(provider, &payload.body, true)?,
        PayloadSchema::OhlcvRows { has_volume } => rows(provider, &payload.body, has_volume)?,
        PayloadSchema::CryptoCompareHisto => histo(provider, &payload.body)?,
        PayloadSchema::PriceSeries { window, lookback, align } => {
            let candles = price_series(provider, &payload.body, window, lookback)?;
            match align {
                Some(timeframe) => resample(&candles, timeframe),
                None => candles,
            }
        }
    };

    candles.sort_by_key(|c| c.open_time);
    let before = candles.len();
    let mut unique: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match unique.last_mut() {
            Some(last) if last.open_time == candle.open_time => *last = candle,
            _ => unique.push(candle),
        }
    }
    if unique.len() != before {
        debug!("{} payload had {} duplicate candles", provider, before - unique.len());
    }

    Ok(unique)
}

/// Read a finite number from a JSON number or numeric string.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn timestamp(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// `None` drops the row, `Some(None)` means the volume is unknown.
fn volume(value: Option<&Value>) -> Option<Option<f64>> {
    match value {
        None | Some(Value::Null) => Some(None),
        v => number(v).map(Some),
    }
}

fn close_price(provider: &str, value: Option<&Value>, at: i64) -> Result<f64> {
    number(value).ok_or_else(|| FetchError::malformed(provider, format!("missing or invalid close at {}", at)))
}

fn as_array<'a>(provider: &str, value: Option<&'a Value>, what: &str) -> Result<&'a Vec<Value>> {
    value
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::malformed(provider, format!("expected {} array", what)))
}

/// `[[ts_ms, o, h, l, c, v?, ...], ...]`
fn rows(provider: &str, body: &Value, has_volume: bool) -> Result<Vec<Candle>> {
    let mut candles = Vec::new();
    for row in as_array(provider, Some(body), "row")? {
        let Some(open_time) = timestamp(row.get(0)) else {
            continue;
        };
        let close = close_price(provider, row.get(4), open_time)?;
        let volume = if has_volume { volume(row.get(5)) } else { Some(None) };
        match (number(row.get(1)), number(row.get(2)), number(row.get(3)), volume) {
            (Some(open), Some(high), Some(low), Some(volume)) => {
                candles.push(Candle::new(open_time, open, high, low, close, volume));
            }
            _ => debug!("{} dropped row at {}", provider, open_time),
        }
    }
    Ok(candles)
}

/// `{"Data": {"Data": [{"time": s, "open", "high", "low", "close", "volumeto"}]}}`
fn histo(provider: &str, body: &Value) -> Result<Vec<Candle>> {
    let points = as_array(provider, body.get("Data").and_then(|d| d.get("Data")), "Data.Data")?;
    let mut candles = Vec::new();
    for point in points {
        let Some(time) = timestamp(point.get("time")) else {
            continue;
        };
        let open_time = time * 1000;
        let close = close_price(provider, point.get("close"), open_time)?;
        let fields = (
            number(point.get("open")),
            number(point.get("high")),
            number(point.get("low")),
            volume(point.get("volumeto")),
        );
        match fields {
            // Zero-filled points precede the pair's listing
            (Some(open), Some(high), Some(low), _) if open == 0.0 && high == 0.0 && low == 0.0 && close == 0.0 => {}
            (Some(open), Some(high), Some(low), Some(volume)) => {
                candles.push(Candle::new(open_time, open, high, low, close, volume));
            }
            _ => debug!("{} dropped point at {}", provider, open_time),
        }
    }
    Ok(candles)
}

/// `{"prices": [[ts_ms, price], ...]}` grouped into candles of `window`
/// points. High and low also cover the closes of the previous
/// `lookback - 1` windows.
fn price_series(provider: &str, body: &Value, window: usize, lookback: usize) -> Result<Vec<Candle>> {
    let mut points: Vec<(i64, f64)> = Vec::new();
    for point in as_array(provider, body.get("prices"), "prices")? {
        let Some(ts) = timestamp(point.get(0)) else {
            continue;
        };
        points.push((ts, close_price(provider, point.get(1), ts)?));
    }
    points.sort_by_key(|(ts, _)| *ts);

    let window = window.max(1);
    let lookback = lookback.max(1);
    let mut candles: Vec<Candle> = Vec::with_capacity(points.len() / window + 1);

    for chunk in points.chunks(window) {
        let open_time = chunk[0].0;
        let open = chunk[0].1;
        let close = chunk[chunk.len() - 1].1;

        let prior = candles.iter().rev().take(lookback - 1).map(|c| c.close);
        let span = chunk.iter().map(|(_, p)| *p).chain(prior);
        let (high, low) = span.fold((f64::NEG_INFINITY, f64::INFINITY), |(hi, lo), p| {
            (hi.max(p), lo.min(p))
        });

        candles.push(Candle::new(open_time, open, high, low, close, None));
    }

    Ok(candles)
}

/// Aggregate ordered candles into coarser `timeframe` buckets.
///
/// Volume is the sum of known volumes, unknown when no candle in the bucket
/// carries one.
pub fn resample(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let mut out: Vec<Candle> = Vec::new();

    for candle in candles {
        let bucket = timeframe.floor(candle.open_time);
        match out.last_mut() {
            Some(current) if current.open_time == bucket => {
                current.high = current.high.max(candle.high);
                current.low = current.low.min(candle.low);
                current.close = candle.close;
                current.volume = match (current.volume, candle.volume) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                };
            }
            _ => out.push(Candle { open_time: bucket, ..*candle }),
        }
    }

    out
}
