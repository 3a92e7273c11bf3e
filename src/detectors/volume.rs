//! Volume pattern detectors
//!
//! Statistical anomalies in traded volume: spikes (z-score vs a rolling
//! mean), climactic exhaustion (extreme volume on a wide-range bar) and
//! accumulation/distribution phases (money-flow divergence against price).
//!
//! All rolling statistics use the `window` bars strictly before the bar under
//! test, so a spike does not inflate its own baseline. Flat volume has zero
//! deviation and never signals.

use std::collections::HashMap;

use crate::params::{get_period, get_ratio, ParamMeta, ParameterizedDetector};
use crate::swing::SwingPoint;
use crate::{
    Ohlcv, OhlcvExt, PatternKind, PatternMatch, Period, Ratio, Result, SeriesDetector, Signal,
};

impl_with_defaults!(
    VolumeSpikeDetector,
    VolumeClimaxDetector,
    AccumulationDistributionDetector,
);

/// Rolling mean and population standard deviation of volume
fn volume_stats<T: Ohlcv>(bars: &[T]) -> (f64, f64) {
    let n = bars.len() as f64;
    let mean = bars.iter().map(|b| b.volume()).sum::<f64>() / n;
    let variance = bars
        .iter()
        .map(|b| {
            let d = b.volume() - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

/// Money Flow Volume for a single bar: CLV * volume.
/// CLV = ((close - low) - (high - close)) / (high - low), zero on flat bars.
fn money_flow_volume<T: Ohlcv>(bar: &T) -> f64 {
    let range = bar.range();
    if range > f64::EPSILON {
        let clv = ((bar.close() - bar.low()) - (bar.high() - bar.close())) / range;
        clv * bar.volume()
    } else {
        0.0
    }
}

// ============================================================
// VOLUME SPIKE
// ============================================================

/// Volume spike - volume far above its rolling mean
#[derive(Debug, Clone, Copy)]
pub struct VolumeSpikeDetector {
    /// Rolling window for the volume baseline
    pub window: Period,
    /// Minimum z-score to qualify as a spike
    pub min_z: f64,
}

impl Default for VolumeSpikeDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            min_z: 2.0,
        }
    }
}

impl SeriesDetector for VolumeSpikeDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumeSpike
    }

    fn min_swings(&self) -> usize {
        0
    }

    fn scan<T: Ohlcv>(&self, bars: &[T], _swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let window = self.window.get();
        let mut matches = Vec::new();
        if bars.len() <= window {
            return matches;
        }

        for i in window..bars.len() {
            let (mean, std) = volume_stats(&bars[i - window..i]);
            if std <= f64::EPSILON {
                continue;
            }
            let z = (bars[i].volume() - mean) / std;
            if z < self.min_z {
                continue;
            }

            let bar = &bars[i];
            let signal = if bar.is_bullish() {
                Signal::Buy
            } else if bar.is_bearish() {
                Signal::Sell
            } else {
                Signal::Neutral
            };

            matches.push(PatternMatch::new(
                SeriesDetector::kind(self),
                signal,
                (z / 4.0).min(1.0),
                i,
                i,
                format!("Volume spike: {z:.1} standard deviations above the rolling mean"),
            ));
        }

        matches
    }

    fn validate_config(&self) -> Result<()> {
        if !self.min_z.is_finite() || self.min_z <= 0.0 {
            return Err(crate::PatternError::InvalidConfig(
                "min_z must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// VOLUME CLIMAX
// ============================================================

/// Volume climax - extreme volume on a wide-range bar, read as exhaustion
#[derive(Debug, Clone, Copy)]
pub struct VolumeClimaxDetector {
    /// Rolling window for volume and range baselines
    pub window: Period,
    /// Minimum z-score of volume
    pub min_z: f64,
    /// Bar range must exceed the rolling average range by this multiple
    pub range_mult: f64,
}

impl Default for VolumeClimaxDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            min_z: 3.0,
            range_mult: 1.5,
        }
    }
}

impl SeriesDetector for VolumeClimaxDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::VolumeClimax
    }

    fn min_swings(&self) -> usize {
        0
    }

    fn scan<T: Ohlcv>(&self, bars: &[T], _swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let window = self.window.get();
        let mut matches = Vec::new();
        if bars.len() <= window {
            return matches;
        }

        for i in window..bars.len() {
            let trailing = &bars[i - window..i];
            let (mean, std) = volume_stats(trailing);
            if std <= f64::EPSILON {
                continue;
            }
            let z = (bars[i].volume() - mean) / std;
            if z < self.min_z {
                continue;
            }

            let avg_range =
                trailing.iter().map(|b| OhlcvExt::range(b)).sum::<f64>() / window as f64;
            let bar = &bars[i];
            if bar.range() <= avg_range * self.range_mult {
                continue;
            }

            // Climactic bars mark exhaustion: signal against the bar direction
            let direction = if bar.is_bullish() {
                Signal::Buy
            } else if bar.is_bearish() {
                Signal::Sell
            } else {
                Signal::Neutral
            };
            let signal = direction.reversed();

            matches.push(PatternMatch::new(
                SeriesDetector::kind(self),
                signal,
                (z / 5.0).min(1.0),
                i,
                i,
                format!("Volume climax: exhaustion volume ({z:.1} sigma) on a wide-range bar"),
            ));
        }

        matches
    }

    fn validate_config(&self) -> Result<()> {
        if !self.min_z.is_finite() || self.min_z <= 0.0 {
            return Err(crate::PatternError::InvalidConfig(
                "min_z must be finite and > 0".into(),
            ));
        }
        if !self.range_mult.is_finite() || self.range_mult <= 0.0 {
            return Err(crate::PatternError::InvalidConfig(
                "range_mult must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================
// ACCUMULATION / DISTRIBUTION
// ============================================================

/// Accumulation/distribution phase - money flow diverging from price
///
/// Positive money flow while price holds flat or falls reads as accumulation;
/// negative flow while price holds flat or rises reads as distribution. Flow
/// that merely confirms the price trend is not a phase signal.
#[derive(Debug, Clone, Copy)]
pub struct AccumulationDistributionDetector {
    /// Window over which money flow is accumulated
    pub window: Period,
    /// Minimum |flow| / total volume to qualify as a phase
    pub min_flow: Ratio,
}

impl Default for AccumulationDistributionDetector {
    fn default() -> Self {
        Self {
            window: Period::new_const(20),
            min_flow: Ratio::new_const(0.15),
        }
    }
}

impl SeriesDetector for AccumulationDistributionDetector {
    fn kind(&self) -> PatternKind {
        PatternKind::AccumulationDistribution
    }

    fn min_swings(&self) -> usize {
        0
    }

    fn scan<T: Ohlcv>(&self, bars: &[T], _swings: &[SwingPoint]) -> Vec<PatternMatch> {
        let window = self.window.get();
        if bars.len() < window {
            return Vec::new();
        }

        let start = bars.len() - window;
        let slice = &bars[start..];

        let total_volume: f64 = slice.iter().map(|b| b.volume()).sum();
        if total_volume <= f64::EPSILON {
            return Vec::new();
        }
        // Normalized flow in [-1, 1]: |CLV| <= 1 for every bar
        let flow = slice.iter().map(money_flow_volume).sum::<f64>() / total_volume;

        let first_close = slice[0].close();
        if first_close <= f64::EPSILON {
            return Vec::new();
        }
        let price_change = (slice[window - 1].close() - first_close) / first_close;

        let min_flow = self.min_flow.get();
        let (signal, description) = if flow >= min_flow && price_change <= 0.0 {
            (
                Signal::Buy,
                "Accumulation: positive money flow while price holds or falls",
            )
        } else if flow <= -min_flow && price_change >= 0.0 {
            (
                Signal::Sell,
                "Distribution: negative money flow while price holds or rises",
            )
        } else {
            return Vec::new();
        };

        vec![PatternMatch::new(
            SeriesDetector::kind(self),
            signal,
            (flow.abs() * 2.0).min(1.0),
            start,
            bars.len() - 1,
            description,
        )]
    }
}

// ============================================================
// PARAMETER METADATA
// ============================================================

impl ParameterizedDetector for VolumeSpikeDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::period("window", 20.0, (10.0, 50.0, 5.0), "Rolling volume window"),
            ParamMeta::factor("min_z", 2.0, (1.5, 4.0, 0.5), "Minimum volume z-score"),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 20)?,
            min_z: params.get("min_z").copied().unwrap_or(2.0),
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::VolumeSpike
    }
}

impl ParameterizedDetector for VolumeClimaxDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::period("window", 20.0, (10.0, 50.0, 5.0), "Rolling baseline window"),
            ParamMeta::factor("min_z", 3.0, (2.0, 5.0, 0.5), "Minimum volume z-score"),
            ParamMeta::factor(
                "range_mult",
                1.5,
                (1.0, 3.0, 0.25),
                "Bar range vs average range multiple",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 20)?,
            min_z: params.get("min_z").copied().unwrap_or(3.0),
            range_mult: params.get("range_mult").copied().unwrap_or(1.5),
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::VolumeClimax
    }
}

impl ParameterizedDetector for AccumulationDistributionDetector {
    fn param_meta() -> &'static [ParamMeta] {
        const META: &[ParamMeta] = &[
            ParamMeta::period("window", 20.0, (10.0, 50.0, 5.0), "Money flow window"),
            ParamMeta::ratio(
                "min_flow",
                0.15,
                (0.05, 0.40, 0.05),
                "Minimum normalized money flow",
            ),
        ];
        META
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            window: get_period(params, "window", 20)?,
            min_flow: get_ratio(params, "min_flow", 0.15)?,
        })
    }

    fn pattern_kind() -> PatternKind {
        PatternKind::AccumulationDistribution
    }
}
