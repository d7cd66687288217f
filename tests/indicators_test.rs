//! Indicator engine tests

use banshee::services::{compute_indicators, compute_macd, compute_rsi, compute_williams_r, detect_signals};
use banshee::types::{Candle, CandleSequence, Timeframe};

fn sequence_from_closes(closes: &[f64]) -> CandleSequence {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                i as i64 * 3_600_000,
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                Some(100.0),
            )
        })
        .collect();
    CandleSequence {
        symbol: "BTCUSDT".to_string(),
        timeframe: Timeframe::OneHour,
        limit: closes.len(),
        source: "binance-public".to_string(),
        candles,
    }
}

/// Deterministic pseudo-random walk.
fn random_walk(count: usize, seed: u64) -> Vec<f64> {
    let mut state = seed;
    let mut price = 100.0;
    (0..count)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let step = ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5;
            price = (price + step * 4.0).max(1.0);
            price
        })
        .collect()
}

// =============================================================================
// Bounds Tests
// =============================================================================

#[test]
fn test_rsi_within_bounds() {
    for seed in 1..20 {
        let closes = random_walk(300, seed);
        for value in compute_rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value), "rsi {} out of range", value);
        }
    }
}

#[test]
fn test_williams_r_within_bounds() {
    for seed in 1..20 {
        let frame = compute_indicators(&sequence_from_closes(&random_walk(200, seed)));
        for value in frame.willr.iter().flatten() {
            assert!((-100.0..=0.0).contains(value), "willr {} out of range", value);
        }
    }
}

// =============================================================================
// Shape Tests
// =============================================================================

#[test]
fn test_rising_closes() {
    let closes: Vec<f64> = (0..120).map(|i| 100.0 + i as f64).collect();
    let frame = compute_indicators(&sequence_from_closes(&closes));

    assert_eq!(frame.latest_rsi(), Some(100.0));
    let hist = frame.macd_hist.last().copied().flatten().unwrap();
    assert!(hist >= 0.0, "histogram should be non-negative, got {}", hist);
}

#[test]
fn test_constant_closes_rsi_is_100() {
    let frame = compute_indicators(&sequence_from_closes(&[250.0; 40]));
    for value in frame.rsi[14..].iter() {
        assert_eq!(*value, Some(100.0));
    }
    assert!(frame.macd.iter().flatten().all(|v| v.abs() < 1e-9));
}

#[test]
fn test_warm_up_entries_are_none() {
    let frame = compute_indicators(&sequence_from_closes(&random_walk(60, 7)));
    assert!(frame.rsi[..14].iter().all(Option::is_none));
    assert!(frame.willr[..13].iter().all(Option::is_none));
    assert!(frame.macd[..25].iter().all(Option::is_none));
    assert!(frame.macd_signal[..33].iter().all(Option::is_none));
    assert!(frame.rsi[14..].iter().all(Option::is_some));
    assert!(frame.macd_hist[33..].iter().all(Option::is_some));
}

#[test]
fn test_short_sequence_gives_empty_frame() {
    let frame = compute_indicators(&sequence_from_closes(&random_walk(10, 3)));
    assert!(frame.is_empty());
    assert!(detect_signals(&frame).is_empty());
}

// =============================================================================
// Determinism Tests
// =============================================================================

#[test]
fn test_compute_twice_is_bit_identical() {
    let sequence = sequence_from_closes(&random_walk(250, 11));
    let first = compute_indicators(&sequence);
    let second = compute_indicators(&sequence);

    let bits = |series: &[Option<f64>]| series.iter().map(|v| v.map(f64::to_bits)).collect::<Vec<_>>();
    assert_eq!(bits(&first.rsi), bits(&second.rsi));
    assert_eq!(bits(&first.macd_hist), bits(&second.macd_hist));
    assert_eq!(bits(&first.willr), bits(&second.willr));
}

#[test]
fn test_values_depend_only_on_past_candles() {
    let closes = random_walk(150, 5);
    let full = compute_rsi(&closes, 14);
    let prefix = compute_rsi(&closes[..80], 14);
    assert_eq!(&full[..80], &prefix[..]);

    let full = compute_macd(&closes, 12, 26, 9);
    let prefix = compute_macd(&closes[..80], 12, 26, 9);
    assert_eq!(&full.hist[..80], &prefix.hist[..]);

    let highs: Vec<f64> = closes.iter().map(|c| c + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c - 1.0).collect();
    let full = compute_williams_r(&highs, &lows, &closes, 14);
    let prefix = compute_williams_r(&highs[..80], &lows[..80], &closes[..80], 14);
    assert_eq!(&full[..80], &prefix[..]);
}
