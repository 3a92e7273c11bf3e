//! Candlestick pattern detectors
//!
//! Single- to triple-candle reversal and indecision patterns, detected by
//! ratio thresholds on body, shadow and range. All ratios are guarded against
//! zero-range candles: a bar with no range never matches and never produces
//! NaN.

use std::collections::HashMap;

use crate::params::{get_ratio, ParamMeta, ParameterizedDetector};
use crate::{
    CandleDetector, Ohlcv, OhlcvExt, PatternKind, PatternMatch, Ratio, Result, Signal,
};

impl_with_defaults!(
    DojiDetector,
    HammerDetector,
    ShootingStarDetector,
    EngulfingDetector,
    MorningStarDetector,
    EveningStarDetector,
);

// ============================================================
// DOJI
// ============================================================

/// Doji - open and close nearly equal relative to the bar's range
#[derive(Debug, Clone, Copy)]
pub struct DojiDetector {
    /// Maximum body/range ratio to qualify as a doji
    pub max_body_ratio: Ratio,
}

impl Default for DojiDetector {
    fn default() -> Self {
        Self {
            max_body_ratio: Ratio::new_const(0.10),
        }
    }
}

impl CandleDetector for DojiDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Doji
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        let bar = bars.get(index)?;
        // Zero-range bar: treated as "not detected", not as a perfect doji
        let body_ratio = bar.body_ratio()?;

        let max = self.max_body_ratio.get();
        if body_ratio > max {
            return None;
        }

        // Linear falloff: zero body scores 1.0, body at the threshold scores 0
        let strength = 1.0 - body_ratio / max;

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            Signal::Neutral,
            strength,
            index,
            index,
            "Doji: open and close nearly equal, market indecision",
        ))
    }
}

// ============================================================
// HAMMER / SHOOTING STAR
// ============================================================

/// Hammer - long lower shadow after a lower low (downtrend context)
#[derive(Debug, Clone, Copy)]
pub struct HammerDetector {
    /// Lower shadow must be at least this multiple of the body
    pub min_shadow_body_mult: f64,
    /// Upper shadow must be at most this multiple of the body
    pub max_opposite_mult: f64,
    /// Maximum body/range ratio
    pub max_body_ratio: Ratio,
}

impl Default for HammerDetector {
    fn default() -> Self {
        Self {
            min_shadow_body_mult: 2.0,
            max_opposite_mult: 0.5,
            max_body_ratio: Ratio::new_const(0.30),
        }
    }
}

impl CandleDetector for HammerDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Hammer
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let bar = bars.get(index)?;
        let prev = bars.get(index - 1)?;

        let body = bar.body();
        let lower = bar.lower_shadow();
        let upper = bar.upper_shadow();
        let range = bar.range();

        if range <= f64::EPSILON {
            return None;
        }
        if lower < body * self.min_shadow_body_mult {
            return None;
        }
        if upper > body * self.max_opposite_mult {
            return None;
        }
        if body / range > self.max_body_ratio.get() {
            return None;
        }
        // Downtrend context: the bar must break the prior low
        if bar.low() >= prev.low() {
            return None;
        }

        let strength = 0.8 * (lower / range) + 0.2;

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            Signal::Buy,
            strength,
            index,
            index,
            "Hammer: long lower shadow after a lower low, sellers rejected",
        ))
    }
}

/// Shooting star - mirror of the hammer (long upper shadow after a higher high)
#[derive(Debug, Clone, Copy)]
pub struct ShootingStarDetector {
    /// Upper shadow must be at least this multiple of the body
    pub min_shadow_body_mult: f64,
    /// Lower shadow must be at most this multiple of the body
    pub max_opposite_mult: f64,
    /// Maximum body/range ratio
    pub max_body_ratio: Ratio,
}

impl Default for ShootingStarDetector {
    fn default() -> Self {
        Self {
            min_shadow_body_mult: 2.0,
            max_opposite_mult: 0.5,
            max_body_ratio: Ratio::new_const(0.30),
        }
    }
}

impl CandleDetector for ShootingStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::ShootingStar
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let bar = bars.get(index)?;
        let prev = bars.get(index - 1)?;

        let body = bar.body();
        let lower = bar.lower_shadow();
        let upper = bar.upper_shadow();
        let range = bar.range();

        if range <= f64::EPSILON {
            return None;
        }
        if upper < body * self.min_shadow_body_mult {
            return None;
        }
        if lower > body * self.max_opposite_mult {
            return None;
        }
        if body / range > self.max_body_ratio.get() {
            return None;
        }
        // Uptrend context: the bar must break the prior high
        if bar.high() <= prev.high() {
            return None;
        }

        let strength = 0.8 * (upper / range) + 0.2;

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            Signal::Sell,
            strength,
            index,
            index,
            "Shooting star: long upper shadow after a higher high, buyers rejected",
        ))
    }
}

// ============================================================
// ENGULFING
// ============================================================

/// Engulfing - current body fully contains and reverses the previous body
#[derive(Debug, Clone, Copy, Default)]
pub struct EngulfingDetector;

impl CandleDetector for EngulfingDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Engulfing
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 1 {
            return None;
        }
        let prev = bars.get(index - 1)?;
        let curr = bars.get(index)?;

        let prev_body = prev.body();
        let curr_body = curr.body();
        if prev_body <= f64::EPSILON || curr_body <= f64::EPSILON {
            return None;
        }

        // Direction must reverse
        let (signal, description) = if prev.is_bearish() && curr.is_bullish() {
            (
                Signal::Buy,
                "Bullish engulfing: buying pressure swallowed the prior decline",
            )
        } else if prev.is_bullish() && curr.is_bearish() {
            (
                Signal::Sell,
                "Bearish engulfing: selling pressure swallowed the prior advance",
            )
        } else {
            return None;
        };

        // Current body must contain the previous body on both ends
        let prev_top = prev.open().max(prev.close());
        let prev_bottom = prev.open().min(prev.close());
        let curr_top = curr.open().max(curr.close());
        let curr_bottom = curr.open().min(curr.close());
        if curr_top < prev_top || curr_bottom > prev_bottom {
            return None;
        }

        // Larger engulfing bodies score higher, capped at 1.0
        let strength = (curr_body / prev_body / 2.0).min(1.0);

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            signal,
            strength,
            index - 1,
            index,
            description,
        ))
    }
}

// ============================================================
// MORNING / EVENING STAR
// ============================================================

/// Morning star - three-bar bullish reversal
#[derive(Debug, Clone, Copy)]
pub struct MorningStarDetector {
    /// Minimum body/range ratio for the first (trend) candle
    pub min_first_body_ratio: Ratio,
    /// Maximum body/range ratio for the middle (star) candle
    pub max_star_body_ratio: Ratio,
}

impl Default for MorningStarDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: Ratio::new_const(0.5),
            max_star_body_ratio: Ratio::new_const(0.3),
        }
    }
}

impl CandleDetector for MorningStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::MorningStar
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 2 {
            return None;
        }
        let first = bars.get(index - 2)?;
        let star = bars.get(index - 1)?;
        let third = bars.get(index)?;

        // First: strong bearish move
        if !first.is_bearish() {
            return None;
        }
        if first.body_ratio()? < self.min_first_body_ratio.get() {
            return None;
        }

        // Star: small body gapping below the first close
        if star.body_ratio().is_some_and(|r| r > self.max_star_body_ratio.get()) {
            return None;
        }
        let star_body_top = star.open().max(star.close());
        if star_body_top >= first.close() {
            return None;
        }

        // Third: bullish close back past the midpoint of the first body
        if !third.is_bullish() {
            return None;
        }
        let first_midpoint = (first.open() + first.close()) / 2.0;
        if third.close() <= first_midpoint {
            return None;
        }

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            Signal::Buy,
            0.8,
            index - 2,
            index,
            "Morning star: gap-down star reversed by a strong bullish close",
        ))
    }
}

/// Evening star - three-bar bearish reversal (mirror of morning star)
#[derive(Debug, Clone, Copy)]
pub struct EveningStarDetector {
    /// Minimum body/range ratio for the first (trend) candle
    pub min_first_body_ratio: Ratio,
    /// Maximum body/range ratio for the middle (star) candle
    pub max_star_body_ratio: Ratio,
}

impl Default for EveningStarDetector {
    fn default() -> Self {
        Self {
            min_first_body_ratio: Ratio::new_const(0.5),
            max_star_body_ratio: Ratio::new_const(0.3),
        }
    }
}

impl CandleDetector for EveningStarDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::EveningStar
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
        if index < 2 {
            return None;
        }
        let first = bars.get(index - 2)?;
        let star = bars.get(index - 1)?;
        let third = bars.get(index)?;

        // First: strong bullish move
        if !first.is_bullish() {
            return None;
        }
        if first.body_ratio()? < self.min_first_body_ratio.get() {
            return None;
        }

        // Star: small body gapping above the first close
        if star.body_ratio().is_some_and(|r| r > self.max_star_body_ratio.get()) {
            return None;
        }
        let star_body_bottom = star.open().min(star.close());
        if star_body_bottom <= first.close() {
            return None;
        }

        // Third: bearish close back past the midpoint of the first body
        if !third.is_bearish() {
            return None;
        }
        let first_midpoint = (first.open() + first.close()) / 2.0;
        if third.close() >= first_midpoint {
            return None;
        }

        Some(PatternMatch::new(
            CandleDetector::kind(self),
            Signal::Sell,
            0.8,
            index - 2,
            index,
            "Evening star: gap-up star reversed by a strong bearish close",
        ))
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

impl ParameterizedDetector for DojiDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[ParamMeta::ratio(
            "max_body_ratio",
            0.10,
            (0.05, 0.20, 0.01),
            "Maximum body/range ratio for a doji",
        )];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.10)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::Doji
    }
}

impl ParameterizedDetector for HammerDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::factor(
                "min_shadow_body_mult",
                2.0,
                (1.5, 3.0, 0.25),
                "Lower shadow as a multiple of the body",
            ),
            ParamMeta::factor(
                "max_opposite_mult",
                0.5,
                (0.25, 1.0, 0.25),
                "Upper shadow as a multiple of the body",
            ),
            ParamMeta::ratio(
                "max_body_ratio",
                0.30,
                (0.20, 0.40, 0.05),
                "Maximum body/range ratio",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_shadow_body_mult: params.get("min_shadow_body_mult").copied().unwrap_or(2.0),
            max_opposite_mult: params.get("max_opposite_mult").copied().unwrap_or(0.5),
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.30)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::Hammer
    }
}

impl ParameterizedDetector for ShootingStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::factor(
                "min_shadow_body_mult",
                2.0,
                (1.5, 3.0, 0.25),
                "Upper shadow as a multiple of the body",
            ),
            ParamMeta::factor(
                "max_opposite_mult",
                0.5,
                (0.25, 1.0, 0.25),
                "Lower shadow as a multiple of the body",
            ),
            ParamMeta::ratio(
                "max_body_ratio",
                0.30,
                (0.20, 0.40, 0.05),
                "Maximum body/range ratio",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_shadow_body_mult: params.get("min_shadow_body_mult").copied().unwrap_or(2.0),
            max_opposite_mult: params.get("max_opposite_mult").copied().unwrap_or(0.5),
            max_body_ratio: get_ratio(params, "max_body_ratio", 0.30)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::ShootingStar
    }
}

impl ParameterizedDetector for MorningStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::ratio(
                "min_first_body_ratio",
                0.5,
                (0.4, 0.7, 0.05),
                "Minimum body/range ratio of the trend candle",
            ),
            ParamMeta::ratio(
                "max_star_body_ratio",
                0.3,
                (0.1, 0.4, 0.05),
                "Maximum body/range ratio of the star candle",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_first_body_ratio: get_ratio(params, "min_first_body_ratio", 0.5)?,
            max_star_body_ratio: get_ratio(params, "max_star_body_ratio", 0.3)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::MorningStar
    }
}

impl ParameterizedDetector for EveningStarDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::ratio(
                "min_first_body_ratio",
                0.5,
                (0.4, 0.7, 0.05),
                "Minimum body/range ratio of the trend candle",
            ),
            ParamMeta::ratio(
                "max_star_body_ratio",
                0.3,
                (0.1, 0.4, 0.05),
                "Maximum body/range ratio of the star candle",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            min_first_body_ratio: get_ratio(params, "min_first_body_ratio", 0.5)?,
            max_star_body_ratio: get_ratio(params, "max_star_body_ratio", 0.3)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::EveningStar
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn bar(o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            time: 0,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 1000.0,
        }
    }

    #[test]
    fn doji_strength_falls_off_linearly() {
        let d = DojiDetector::with_defaults();

        // Perfect doji: zero body
        let bars = vec![bar(100.0, 105.0, 95.0, 100.0)];
        let m = d.detect(&bars, 0).unwrap();
        assert!((m.strength - 1.0).abs() < 1e-9);
        assert_eq!(m.signal, Signal::Neutral);

        // Body at half the threshold: strength 0.5
        let bars = vec![bar(100.0, 105.0, 95.0, 100.5)];
        let m = d.detect(&bars, 0).unwrap();
        assert!((m.strength - 0.5).abs() < 1e-9);
    }

    #[test]
    fn doji_rejects_zero_range() {
        let d = DojiDetector::with_defaults();
        let bars = vec![bar(100.0, 100.0, 100.0, 100.0)];
        assert!(d.detect(&bars, 0).is_none());
    }

    #[test]
    fn doji_rejects_wide_body() {
        let d = DojiDetector::with_defaults();
        let bars = vec![bar(100.0, 105.0, 95.0, 103.0)];
        assert!(d.detect(&bars, 0).is_none());
    }

    #[test]
    fn hammer_requires_lower_low() {
        let d = HammerDetector::with_defaults();
        // Identical hammer bar, but prior low is below it
        let bars = vec![bar(100.0, 101.0, 90.0, 100.5), bar(100.0, 100.6, 95.0, 100.5)];
        assert!(d.detect(&bars, 1).is_none());
    }

    #[test]
    fn hammer_detects_textbook_shape() {
        let d = HammerDetector::with_defaults();
        // Prior bar low 95; hammer dives to 80 with a tiny body at the top
        let bars = vec![bar(100.0, 105.0, 95.0, 96.0), bar(95.0, 95.1, 80.0, 94.8)];
        let m = d.detect(&bars, 1).unwrap();
        assert_eq!(m.signal, Signal::Buy);
        assert!(m.strength > 0.9);
    }

    #[test]
    fn shooting_star_mirror() {
        let d = ShootingStarDetector::with_defaults();
        let bars = vec![bar(100.0, 105.0, 95.0, 104.0), bar(105.0, 120.0, 105.0, 105.2)];
        let m = d.detect(&bars, 1).unwrap();
        assert_eq!(m.signal, Signal::Sell);
    }

    #[test]
    fn engulfing_contains_and_reverses() {
        let d = EngulfingDetector::with_defaults();
        let bars = vec![bar(100.0, 101.0, 98.0, 99.0), bar(98.5, 103.0, 98.0, 102.0)];
        let m = d.detect(&bars, 1).unwrap();
        assert_eq!(m.signal, Signal::Buy);
        assert_eq!(m.start_index, 0);
        assert_eq!(m.end_index, 1);
        // body 3.5 vs 1.0: strength capped contribution 3.5/2 -> 1.0
        assert!((m.strength - 1.0).abs() < 1e-9);
    }

    #[test]
    fn engulfing_rejects_same_direction() {
        let d = EngulfingDetector::with_defaults();
        let bars = vec![bar(98.0, 101.0, 97.0, 100.0), bar(97.0, 103.0, 96.0, 102.0)];
        assert!(d.detect(&bars, 1).is_none());
    }

    #[test]
    fn engulfing_rejects_partial_containment() {
        let d = EngulfingDetector::with_defaults();
        // Current body top (101.5) below previous top (102.0)
        let bars = vec![bar(102.0, 102.5, 99.0, 99.5), bar(99.0, 102.0, 98.5, 101.5)];
        assert!(d.detect(&bars, 1).is_none());
    }

    #[test]
    fn morning_star_detects_reversal() {
        let d = MorningStarDetector::with_defaults();
        let bars = vec![
            bar(110.0, 111.0, 99.0, 100.0),  // strong bearish
            bar(98.0, 99.0, 97.0, 98.5),     // small star gapping below 100
            bar(99.0, 107.0, 98.5, 106.0),   // bullish close above midpoint 105
        ];
        let m = d.detect(&bars, 2).unwrap();
        assert_eq!(m.signal, Signal::Buy);
        assert!((m.strength - 0.8).abs() < 1e-9);
        assert_eq!(m.start_index, 0);
    }

    #[test]
    fn evening_star_detects_reversal() {
        let d = EveningStarDetector::with_defaults();
        let bars = vec![
            bar(100.0, 111.0, 99.0, 110.0),   // strong bullish
            bar(112.0, 113.5, 111.6, 112.5),  // star gapping above 110
            bar(111.0, 111.5, 103.0, 104.0),  // bearish close below midpoint 105
        ];
        let m = d.detect(&bars, 2).unwrap();
        assert_eq!(m.signal, Signal::Sell);
    }

    #[test]
    fn morning_star_rejects_star_without_gap()  {
        let d = MorningStarDetector::with_defaults();
        let bars = vec![
            bar(110.0, 111.0, 99.0, 100.0),
            bar(100.5, 102.0, 100.0, 101.0), // star body overlaps first close
            bar(99.0, 107.0, 98.5, 106.0),
        ];
        assert!(d.detect(&bars, 2).is_none());
    }

    #[test]
    fn param_meta_roundtrip() {
        let mut params = HashMap::new();
        params.insert("max_body_ratio", 0.15);
        let d = DojiDetector::with_params(&params).unwrap();
        assert!((d.max_body_ratio.get() - 0.15).abs() < 1e-9);

        // Defaults fill in missing params
        let d = HammerDetector::with_params(&HashMap::new()).unwrap();
        assert!((d.min_shadow_body_mult - 2.0).abs() < 1e-9);
    }
}
