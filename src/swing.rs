//! Swing-point detection
//!
//! A swing high (low) is a bar whose high (low) strictly exceeds (undercuts)
//! every bar within a symmetric lookback window on both sides. Swing points
//! are the geometric basis for chart and harmonic pattern detection; they are
//! recomputed per scan and never persisted.

use crate::Ohlcv;

/// Kind of local extremum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwingKind {
    High,
    Low,
}

/// A local price extremum over a symmetric neighborhood window
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
}

impl SwingPoint {
    #[inline]
    pub fn is_high(&self) -> bool {
        self.kind == SwingKind::High
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        self.kind == SwingKind::Low
    }
}

/// Find swing highs and lows, ordered by index.
///
/// A bar can be both a swing high and a swing low (wide-range bar between
/// two quiet neighborhoods); both points are emitted, high first. Bars within
/// `window` of either edge are never swing points, so sequences shorter than
/// `2 * window + 1` yield no swings.
pub fn find_swing_points<T: Ohlcv>(bars: &[T], window: usize) -> Vec<SwingPoint> {
    let n = bars.len();
    let mut points = Vec::new();

    if window == 0 || n < 2 * window + 1 {
        return points;
    }

    for i in window..(n - window) {
        let high = bars[i].high();
        let low = bars[i].low();

        let mut is_swing_high = true;
        let mut is_swing_low = true;
        for j in 1..=window {
            if high <= bars[i - j].high() || high <= bars[i + j].high() {
                is_swing_high = false;
            }
            if low >= bars[i - j].low() || low >= bars[i + j].low() {
                is_swing_low = false;
            }
            if !is_swing_high && !is_swing_low {
                break;
            }
        }

        if is_swing_high {
            points.push(SwingPoint {
                index: i,
                price: high,
                kind: SwingKind::High,
            });
        }
        if is_swing_low {
            points.push(SwingPoint {
                index: i,
                price: low,
                kind: SwingKind::Low,
            });
        }
    }

    points
}

/// The `count` most recent swing points of the given kind, oldest first.
pub fn recent_of_kind(swings: &[SwingPoint], kind: SwingKind, count: usize) -> Vec<SwingPoint> {
    let mut picked: Vec<SwingPoint> = swings
        .iter()
        .rev()
        .filter(|s| s.kind == kind)
        .take(count)
        .copied()
        .collect();
    picked.reverse();
    picked
}

/// True if any bar strictly between the two indices has a high above `level`.
pub fn has_higher_high_between<T: Ohlcv>(bars: &[T], start: usize, end: usize, level: f64) -> bool {
    bars[start + 1..end].iter().any(|b| b.high() > level)
}

/// True if any bar strictly between the two indices has a low below `level`.
pub fn has_lower_low_between<T: Ohlcv>(bars: &[T], start: usize, end: usize, level: f64) -> bool {
    bars[start + 1..end].iter().any(|b| b.low() < level)
}
