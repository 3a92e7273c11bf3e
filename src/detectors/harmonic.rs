//! Harmonic pattern detectors (Gartley, Butterfly, Bat)
//!
//! XABCD formations over the five most recent alternating swing points, with
//! each leg validated against Fibonacci-ratio bands. A leg outside its band
//! by more than the tolerance rejects the pattern; legs inside score 1.0 and
//! legs within the tolerance fringe score linearly down to 0. Pattern
//! strength is the mean leg score.
//!
//! Direction comes from the completing D point: a swing low completes a
//! bullish pattern, a swing high a bearish one.

use std::collections::HashMap;

use crate::params::{get_ratio, ParamMeta, ParameterizedDetector};
use crate::swing::SwingPoint;
use crate::{Ohlcv, PatternKind, PatternMatch, Ratio, Result, SeriesDetector, Signal};

impl_with_defaults!(GartleyDetector, ButterflyDetector, BatDetector);

// ============================================================
// LEG GEOMETRY
// ============================================================

/// Acceptable ratio interval for one leg. Point targets (e.g. 0.618) use a
/// degenerate interval where lo == hi.
#[derive(Debug, Clone, Copy)]
struct Band {
    lo: f64,
    hi: f64,
}

const fn band(lo: f64, hi: f64) -> Band {
    Band { lo, hi }
}

const fn point(target: f64) -> Band {
    Band {
        lo: target,
        hi: target,
    }
}

/// Ratio requirements for one XABCD pattern
#[derive(Debug, Clone, Copy)]
struct LegBands {
    ab_xa: Band,
    bc_ab: Band,
    cd_bc: Band,
    ad_xa: Band,
}

/// Score a measured ratio against its band: 1.0 inside, linear falloff in the
/// tolerance fringe, None beyond it.
fn leg_score(value: f64, band: Band, tolerance: f64) -> Option<f64> {
    if value >= band.lo && value <= band.hi {
        return Some(1.0);
    }
    let dist = if value < band.lo {
        band.lo - value
    } else {
        value - band.hi
    };
    (dist <= tolerance).then(|| 1.0 - dist / tolerance)
}

/// The five most recent swing points, if they strictly alternate high/low.
/// Returns the points X, A, B, C, D plus the pattern direction.
fn last_xabcd(swings: &[SwingPoint]) -> Option<([SwingPoint; 5], Signal)> {
    if swings.len() < 5 {
        return None;
    }
    let tail = &swings[swings.len() - 5..];
    if tail.windows(2).any(|pair| pair[0].kind == pair[1].kind) {
        return None;
    }
    let signal = if tail[4].is_low() {
        Signal::Buy
    } else {
        Signal::Sell
    };
    Some(([tail[0], tail[1], tail[2], tail[3], tail[4]], signal))
}

fn detect_xabcd(
    kind: PatternKind,
    bands: LegBands,
    tolerance: f64,
    swings: &[SwingPoint],
    description: &str,
) -> Vec<PatternMatch> {
    let Some(([x, a, b, c, d], signal)) = last_xabcd(swings) else {
        return Vec::new();
    };

    let xa = (a.price - x.price).abs();
    let ab = (b.price - a.price).abs();
    let bc = (c.price - b.price).abs();
    let cd = (d.price - c.price).abs();
    let ad = (a.price - d.price).abs();
    if xa <= f64::EPSILON || ab <= f64::EPSILON || bc <= f64::EPSILON {
        return Vec::new();
    }

    let scores = [
        leg_score(ab / xa, bands.ab_xa, tolerance),
        leg_score(bc / ab, bands.bc_ab, tolerance),
        leg_score(cd / bc, bands.cd_bc, tolerance),
        leg_score(ad / xa, bands.ad_xa, tolerance),
    ];
    if scores.iter().any(|s| s.is_none()) {
        return Vec::new();
    }
    let strength = scores.iter().map(|s| s.unwrap()).sum::<f64>() / scores.len() as f64;

    vec![PatternMatch::new(
        kind,
        signal,
        strength,
        x.index,
        d.index,
        description,
    )]
}

// ============================================================
// DETECTORS
// ============================================================

/// Gartley - AB retraces 0.618 of XA, D completes at 0.786 of XA
#[derive(Debug, Clone, Copy)]
pub struct GartleyDetector {
    /// Tolerance fringe around each ratio band
    pub tolerance: Ratio,
}

impl Default for GartleyDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.05),
        }
    }
}

impl SeriesDetector for GartleyDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Gartley
    }

    fn min_swings(&self) -> usize {
        5
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        const BANDS: LegBands = LegBands {
            ab_xa: point(0.618),
            bc_ab: band(0.382, 0.886),
            cd_bc: band(1.13, 1.618),
            ad_xa: point(0.786),
        };
        detect_xabcd(
            SeriesDetector::kind(self),
            BANDS,
            self.tolerance.get(),
            swings,
            "Gartley: XABCD retracement completing near 0.786 of the XA leg",
        )
    }
}

/// Butterfly - AB retraces 0.786 of XA, D extends to 1.27 of XA
#[derive(Debug, Clone, Copy)]
pub struct ButterflyDetector {
    /// Tolerance fringe around each ratio band
    pub tolerance: Ratio,
}

impl Default for ButterflyDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.05),
        }
    }
}

impl SeriesDetector for ButterflyDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Butterfly
    }

    fn min_swings(&self) -> usize {
        5
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        const BANDS: LegBands = LegBands {
            ab_xa: point(0.786),
            bc_ab: band(0.382, 0.886),
            cd_bc: band(1.618, 2.24),
            ad_xa: point(1.27),
        };
        detect_xabcd(
            SeriesDetector::kind(self),
            BANDS,
            self.tolerance.get(),
            swings,
            "Butterfly: XABCD extension completing near 1.27 of the XA leg",
        )
    }
}

/// Bat - shallow AB retracement (0.382-0.50), D completes at 0.886 of XA
#[derive(Debug, Clone, Copy)]
pub struct BatDetector {
    /// Tolerance fringe around each ratio band
    pub tolerance: Ratio,
}

impl Default for BatDetector {
    fn default() -> Self {
        Self {
            tolerance: Ratio::new_const(0.05),
        }
    }
}

impl SeriesDetector for BatDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::Bat
    }

    fn min_swings(&self) -> usize {
        5
    }

    fn scan<T: Ohlcv>(&self, _bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
        const BANDS: LegBands = LegBands {
            ab_xa: band(0.382, 0.50),
            bc_ab: band(0.382, 0.886),
            cd_bc: band(1.618, 2.618),
            ad_xa: point(0.886),
        };
        detect_xabcd(
            SeriesDetector::kind(self),
            BANDS,
            self.tolerance.get(),
            swings,
            "Bat: shallow XABCD retracement completing near 0.886 of the XA leg",
        )
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

macro_rules! impl_harmonic_params {
    ($($detector:ty => $kind:expr),* $(,)?) => {
        $(impl ParameterizedDetector for $detector {
            fn param_meta() -> &'static [ParamMeta] {
                const META: &[ParamMeta] = &[ParamMeta::ratio(
                    "tolerance",
                    0.05,
                    (0.02, 0.10, 0.01),
                    "Tolerance fringe around each Fibonacci band",
                )];
                META
            }

            fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
                Ok(Self {
                    tolerance: get_ratio(params, "tolerance", 0.05)?,
                })
            }

            fn pattern_kind() -> PatternKind {
                $kind
            }
        })*
    };
}

impl_harmonic_params!(
    GartleyDetector => PatternKind::Gartley,
    ButterflyDetector => PatternKind::Butterfly,
    BatDetector => PatternKind::Bat,
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::SwingKind;
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
    fn leg_score_inside_and_fringe() {
        let b = band(0.382, 0.886);
        assert_eq!(leg_score(0.5, b, 0.05), Some(1.0));
        assert_eq!(leg_score(0.382, b, 0.05), Some(1.0));
        // 0.02 outside the band: 1 - 0.02/0.05
        let fringe = leg_score(0.362, b, 0.05).unwrap();
        assert!((fringe - 0.6).abs() < 1e-9);
        assert_eq!(leg_score(0.3, b, 0.05), None);
    }

    #[test]
    fn gartley_bullish_exact_ratios() {
        // XA=100, AB=61.8 (0.618), BC=38.19 (0.618 of AB), AD=78.6 (0.786)
        let swings = vec![
            low(0, 100.0),
            high(10, 200.0),
            low(20, 138.2),
            high(30, 176.39),
            low(40, 121.4),
        ];

        let found = GartleyDetector::with_defaults().scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        let m = &found[0];
        assert_eq!(m.kind, PatternKind::Gartley);
        assert_eq!(m.signal, Signal::Buy);
        assert!((m.strength - 1.0).abs() < 1e-9);
        assert_eq!(m.start_index, 0);
        assert_eq!(m.end_index, 40);
    }

    #[test]
    fn gartley_bearish_mirror() {
        let swings = vec![
            high(0, 200.0),
            low(10, 100.0),
            high(20, 161.8),
            low(30, 123.61),
            high(40, 178.6),
        ];

        let found = GartleyDetector::with_defaults().scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal, Signal::Sell);
    }

    #[test]
    fn butterfly_bullish_exact_ratios() {
        // XA=100, AB=78.6 (0.786), BC=47.16 (0.6 of AB), AD=127 (1.27)
        let swings = vec![
            low(0, 100.0),
            high(10, 200.0),
            low(20, 121.4),
            high(30, 168.56),
            low(40, 73.0),
        ];

        let found = ButterflyDetector::with_defaults().scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal, Signal::Buy);
        assert!(found[0].strength > 0.99);
    }

    #[test]
    fn bat_bullish_exact_ratios() {
        // XA=100, AB=45 (0.45), BC=36 (0.8 of AB), AD=88.6 (0.886)
        let swings = vec![
            low(0, 100.0),
            high(10, 200.0),
            low(20, 155.0),
            high(30, 191.0),
            low(40, 111.4),
        ];

        let found = BatDetector::with_defaults().scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].signal, Signal::Buy);
        assert!(found[0].strength > 0.99);
    }

    #[test]
    fn rejects_non_alternating_swings() {
        let swings = vec![
            low(0, 100.0),
            high(10, 200.0),
            high(20, 210.0),
            low(30, 150.0),
            low(40, 140.0),
        ];
        assert!(GartleyDetector::with_defaults()
            .scan(&no_bars(), &swings)
            .is_empty());
    }

    #[test]
    fn rejects_ratios_outside_bands() {
        // AB/XA = 0.30, far from the Gartley 0.618 target
        let swings = vec![
            low(0, 100.0),
            high(10, 200.0),
            low(20, 170.0),
            high(30, 190.0),
            low(40, 120.0),
        ];
        assert!(GartleyDetector::with_defaults()
            .scan(&no_bars(), &swings)
            .is_empty());
    }

    #[test]
    fn uses_only_most_recent_five_swings() {
        // Noise before an exact bullish Gartley
        let mut swings = vec![high(0, 150.0), low(1, 80.0)];
        swings.extend([
            low(5, 100.0),
            high(15, 200.0),
            low(25, 138.2),
            high(35, 176.39),
            low(45, 121.4),
        ]);

        let found = GartleyDetector::with_defaults().scan(&no_bars(), &swings);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start_index, 5);
    }
}
