//! Chart pattern detectors
//!
//! Geometric formations over derived swing points. Each detector anchors on
//! the most recent swings, so at most one match is reported per scan.
//!
//! Triangle and wedge are placeholders that never match; the aggregation
//! layer treats them like any other detector, so a real implementation can be
//! dropped in without touching anything else.

use std::collections::HashMap;

use crate::params::{get_ratio, ParamMeta, ParameterizedDetector};
use crate::swing::{
    has_higher_high_between, has_lower_low_between, recent_of_kind, SwingKind, SwingPoint,
};
use crate::{Ohlcv, PatternKind, PatternMatch, Ratio, Result, SeriesDetector, Signal};

impl_with_defaults!(
    HeadShouldersDetector,
    DoubleTopDetector,
    DoubleBottomDetector,
    TriangleDetector,
    WedgeDetector,
);

// ============================================================
// HEAD AND SHOULDERS
// ============================================================

/// Head and shoulders - three swing highs, middle highest, shoulders level
#[derive(Debug, Clone, Copy)]
pub struct HeadShouldersDetector {
    /// Maximum relative difference between the two shoulders
    pub shoulder_tolerance: Ratio,
}

impl Default for HeadShouldersDetector {
    fn default() -> Self {
        Self {
            shoulder_tolerance: Ratio::new_const(0.05),
        }
    }
}

impl SeriesDetector for HeadShouldersDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::HeadShoulders
    }

    fn min_swings(&self) -> usize {
        3
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let highs = recent_of_kind(swings, SwingKind::High, 3);
        if highs.len() < 3 {
            return Vec::new();
        }
        let (left, head, right) = (highs[0], highs[1], highs[2]);

        if head.price <= left.price || head.price <= right.price {
            return Vec::new();
        }
        if left.price <= 0.0 {
            return Vec::new();
        }
        let shoulder_diff = (left.price - right.price).abs() / left.price;
        if shoulder_diff >= self.shoulder_tolerance.get() {
            return Vec::new();
        }

        vec![PatternMatch::new(
            SeriesDetector::kind(self),
            Signal::Sell,
            0.8,
            left.index,
            right.index,
            "Head and shoulders: failed retest of the high between level shoulders",
        )]
    }
}

// ============================================================
// DOUBLE TOP / BOTTOM
// ============================================================

/// Double top - two most recent swing highs at nearly the same level
#[derive(Debug, Clone, Copy)]
pub struct DoubleTopDetector {
    /// Maximum relative difference between the two peaks
    pub tolerance: Ratio,
}

impl Default for DoubleTopDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.03),
        }
    }
}

impl SeriesDetector for DoubleTopDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DoubleTop
    }

    fn min_swings(&self) -> usize {
        2
    }

    fn scan<T: Ohlcv>(&self, bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let highs = recent_of_kind(swings, SwingKind::High, 2);
        if highs.len() < 2 {
            return Vec::new();
        }
        let (first, second) = (highs[0], highs[1]);

        let reference = first.price.max(second.price);
        if reference <= 0.0 {
            return Vec::new();
        }
        let diff = (first.price - second.price).abs() / reference;
        if diff >= self.tolerance.get() {
            return Vec::new();
        }
        // A clean double top has no intervening high above the peaks
        if second.index < bars.len()
            && has_higher_high_between(bars, first.index, second.index, reference)
        {
            return Vec::new();
        }

        vec![PatternMatch::new(
            SeriesDetector::kind(self),
            Signal::Sell,
            0.8,
            first.index,
            second.index,
            "Double top: second rally stalled at the prior peak",
        )]
    }
}

/// Double bottom - two most recent swing lows at nearly the same level
#[derive(Debug, Clone, Copy)]
pub struct DoubleBottomDetector {
    /// Maximum relative difference between the two troughs
    pub tolerance: Ratio,
}

impl Default for DoubleBottomDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.03),
        }
    }
}

impl SeriesDetector for DoubleBottomDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::DoubleBottom
    }

    fn min_swings(&self) -> usize {
        2
    }

    fn scan<T: Ohlcv>(&self, bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let lows = recent_of_kind(swings, SwingKind::Low, 2);
        if lows.len() < 2 {
            return Vec::new();
        }
        let (first, second) = (lows[0], lows[1]);

        let reference = first.price.max(second.price);
        if reference <= 0.0 {
            return Vec::new();
        }
        let diff = (first.price - second.price).abs() / reference;
        if diff >= self.tolerance.get() {
            return Vec::new();
        }
        // A clean double bottom has no intervening low below the troughs
        let floor = first.price.min(second.price);
        if second.index < bars.len()
            && has_lower_low_between(bars, first.index, second.index, floor)
        {
            return Vec::new();
        }

        vec![PatternMatch::new(
            SeriesDetector::kind(self),
            Signal::Buy,
            0.8,
            first.index,
            second.index,
            "Double bottom: second decline held the prior trough",
        )]
    }
}

// ============================================================
// TRIANGLE / WEDGE (placeholders)
// ============================================================

/// Triangle - converging trendlines. Detection is not implemented; always
/// reports no match.
// TODO: fit trendlines through successive swing highs/lows and test for
// convergence (ascending/descending/symmetrical)
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangleDetector;

impl SeriesDetector for TriangleDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Triangle
    }

    fn min_swings(&self) -> usize {
        4
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], _swings: &[SwingPoint]) -> Vec<PatternMatch> {
        Vec::new()
    }
}

/// Wedge - converging trendlines sloping the same way. Detection is not
/// implemented; always reports no match.
#[derive(Debug, Clone, Copy, Default)]
pub struct WedgeDetector;

impl SeriesDetector for WedgeDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Wedge
    }

    fn min_swings(&self) -> usize {
        4
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], _swings: &[SwingPoint]) -> Vec<PatternMatch> {
        Vec::new()
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

impl ParameterizedDetector for HeadShouldersDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[ParamMeta::ratio(
            "shoulder_tolerance",
            0.05,
            (0.02, 0.10, 0.01),
            "Maximum relative difference between shoulders",
        )];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            shoulder_tolerance: get_ratio(params, "shoulder_tolerance", 0.05)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::HeadShoulders
    }
}

impl ParameterizedDetector for DoubleTopDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[ParamMeta::ratio(
            "tolerance",
            0.03,
            (0.01, 0.05, 0.01),
            "Maximum relative difference between peaks",
        )];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.03)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DoubleTop
    }
}

impl ParameterizedDetector for DoubleBottomDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[ParamMeta::ratio(
            "tolerance",
            0.03,
            (0.01, 0.05, 0.01),
            "Maximum relative difference between troughs",
        )];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            tolerance: get_ratio(params, "tolerance", 0.03)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::DoubleBottom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Candle;

    fn high(index: usize, price: f64) -> SwingPoint {
        SwingPoint {
            index,
            price,
            kind: SwingKind::High,
        }
    }

    fn low(index: usize, price: f64) -> SwingPoint {
        SwingPoint {
            index,
            price,
            kind: SwingKind::Low,
        }
    }

    fn no_bars() -> Vec<Candle> {
        Vec::new()
    }

    #[test]
    fn head_shoulders_detects_level_shoulders() {
        let d = HeadShouldersDetector::with_defaults();
        let swings = vec![
            high(10, 100.0),
            low(15, 90.0),
            high(20, 112.0),
            low(25, 91.0),
            high(30, 101.0),
        ];

        let found = d.scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, PatternKind::HeadShoulders);
        assert_eq!(found[0].signal, Signal::Sell);
        assert_eq!(found[0].start_index, 10);
        assert_eq!(found[0].end_index, 30);
    }

    #[test]
    fn head_shoulders_rejects_uneven_shoulders() {
        let d = HeadShouldersDetector::with_defaults();
        // Right shoulder 8% below the left
        let swings = vec![high(10, 100.0), high(20, 112.0), high(30, 92.0)];
        assert!(d.scan(&no_bars(), &swings).is_empty());
    }

    #[test]
    fn head_shoulders_rejects_rising_peaks() {
        let d = HeadShouldersDetector::with_defaults();
        // Head not above the right shoulder
        let swings = vec![high(10, 100.0), high(20, 105.0), high(30, 110.0)];
        assert!(d.scan(&no_bars(), &swings).is_empty());
    }

    #[test]
    fn double_top_within_tolerance() {
        let d = DoubleTopDetector::with_defaults();
        let swings = vec![low(5, 90.0), high(10, 100.0), low(15, 92.0), high(22, 100.5)];

        let found = d.scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal, Signal::Sell);
    }

    #[test]
    fn double_top_rejects_distant_peaks() {
        let d = DoubleTopDetector::with_defaults();
        let swings = vec![high(10, 100.0), high(22, 94.0)];
        assert!(d.scan(&no_bars(), &swings).is_empty());
    }

    #[test]
    fn double_bottom_within_tolerance() {
        let d = DoubleBottomDetector::with_defaults();
        let swings = vec![high(5, 110.0), low(10, 100.0), high(15, 108.0), low(22, 99.5)];

        let found = d.scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal, Signal::Buy);
        assert_eq!(found[0].start_index, 10);
        assert_eq!(found[0].end_index, 22);
    }

    #[test]
    fn placeholders_never_match() {
        let swings = vec![
            high(10, 100.0),
            low(15, 90.0),
            high(20, 101.0),
            low(25, 92.0),
            high(30, 102.0),
        ];
        assert!(TriangleDetector::with_defaults()
            .scan(&no_bars(), &swings)
            .is_empty());
        assert!(WedgeDetector::with_defaults()
            .scan(&no_bars(), &swings)
            .is_empty());
    }
}
