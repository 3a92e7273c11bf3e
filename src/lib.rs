//! # patternscan - OHLCV pattern scanner
//!
//! Pure, synchronous pattern detection over OHLCV candle series. Scans a
//! closed catalogue of candlestick, chart, harmonic and volume patterns and
//! emits ranked trading signals.
//!
//! ## Quick Start
//!
//! ```rust
//! use patternscan::prelude::*;
//!
//! // Define your OHLCV data (or use the provided `Candle` struct)
//! struct Bar { o: f64, h: f64, l: f64, c: f64, v: f64 }
//!
//! impl Ohlcv for Bar {
//!     fn open(&self) -> f64 { self.o }
//!     fn high(&self) -> f64 { self.h }
//!     fn low(&self) -> f64 { self.l }
//!     fn close(&self) -> f64 { self.c }
//!     fn volume(&self) -> f64 { self.v }
//! }
//!
//! // Create engine with all default detectors
//! let engine = EngineBuilder::new()
//!     .with_all_defaults()
//!     .build()
//!     .unwrap();
//!
//! // Scan your data and rank the results
//! let bars: Vec<Bar> = vec![];
//! let detections = engine.detect(&bars).unwrap();
//! let signals = generate_signals(&detections);
//! ```

pub mod detectors;
pub mod params;
pub mod swing;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Aggregation
        generate_signals,
        pattern_strength,
        // Parameters
        params::{get_period, get_ratio, ParamMeta, ParamType, ParameterizedDetector},
        // Parallel
        scan_parallel,
        // Engine
        BuiltinCandleDetector,
        BuiltinScanner,
        // Types
        Candle,
        CandleDetector,
        Detections,
        DynCandleDetector,
        EngineBuilder,
        OhlcvExt,
        PatternEngine,
        // Errors
        PatternError,
        PatternFamily,
        PatternKind,
        PatternMatch,
        Period,
        Ratio,
        Result,
        ScanError,
        ScanResult,
        SeriesDetector,
        Signal,
        Ohlcv,
    };
    pub use crate::swing::{find_swing_points, SwingKind, SwingPoint};
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, PatternError>;

/// Errors that can occur during pattern detection
#[derive(Debug, Clone, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid candle at index {index}: {reason}")]
    InvalidCandle { index: usize, reason: &'static str },
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(PatternError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(PatternError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    /// Create a Ratio from a compile-time constant (library internal use)
    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

/// Period (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(PatternError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// Core OHLCV data trait
pub trait Ohlcv {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn volume(&self) -> f64;

    fn timestamp(&self) -> Option<i64> {
        None
    }
}

/// Blanket impl for references to dyn Ohlcv
impl Ohlcv for &dyn Ohlcv {
    fn open(&self) -> f64 {
        (*self).open()
    }

    fn high(&self) -> f64 {
        (*self).high()
    }

    fn low(&self) -> f64 {
        (*self).low()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }

    fn volume(&self) -> f64 {
        (*self).volume()
    }

    fn timestamp(&self) -> Option<i64> {
        (*self).timestamp()
    }
}

/// Owned candle for callers without their own bar type.
///
/// `time` is an opaque timestamp or sequence index supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Ohlcv for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn volume(&self) -> f64 {
        self.volume
    }

    fn timestamp(&self) -> Option<i64> {
        Some(self.time)
    }
}

/// Extension trait with computed properties for OHLCV data
pub trait OhlcvExt: Ohlcv {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    #[inline]
    fn upper_shadow(&self) -> f64 {
        self.high() - self.open().max(self.close())
    }

    #[inline]
    fn lower_shadow(&self) -> f64 {
        self.open().min(self.close()) - self.low()
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    #[inline]
    fn upper_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.upper_shadow() / range)
    }

    #[inline]
    fn lower_shadow_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.lower_shadow() / range)
    }

    /// Validate OHLCV data consistency
    fn validate(&self) -> Result<()> {
        if self.high() < self.low() {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "high < low",
            });
        }
        let prices = [self.open(), self.high(), self.low(), self.close()];
        if prices.iter().any(|p| p.is_nan()) {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "NaN price",
            });
        }
        if prices.iter().any(|p| p.is_infinite()) {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "infinite price",
            });
        }
        if self.open() > self.high() || self.close() > self.high() {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "open/close above high",
            });
        }
        if self.open() < self.low() || self.close() < self.low() {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "open/close below low",
            });
        }
        if self.volume().is_nan() || self.volume() < 0.0 {
            return Err(PatternError::InvalidCandle {
                index: 0,
                reason: "negative or NaN volume",
            });
        }
        Ok(())
    }
}

impl<T: Ohlcv> OhlcvExt for T {}

// ============================================================
// PATTERN CATALOGUE
// ============================================================

/// Trading signal emitted by a detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl Signal {
    #[inline]
    pub fn is_buy(self) -> bool {
        matches!(self, Signal::Buy)
    }

    #[inline]
    pub fn is_sell(self) -> bool {
        matches!(self, Signal::Sell)
    }

    /// The opposite signal; Neutral stays Neutral.
    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Signal::Buy => Signal::Sell,
            Signal::Sell => Signal::Buy,
            Signal::Neutral => Signal::Neutral,
        }
    }
}

/// Pattern family, used for grouping results and signal thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    Candlestick,
    Chart,
    Harmonic,
    Volume,
}

impl PatternFamily {
    /// Minimum confidence a match must exceed to be emitted as a signal.
    pub fn min_confidence(self) -> f64 {
        match self {
            PatternFamily::Candlestick => 70.0,
            PatternFamily::Chart => 75.0,
            PatternFamily::Harmonic => 80.0,
            PatternFamily::Volume => 70.0,
        }
    }
}

/// Closed catalogue of detectable patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    // Candlestick
    Doji,
    Hammer,
    ShootingStar,
    Engulfing,
    MorningStar,
    EveningStar,
    // Chart
    HeadShoulders,
    DoubleTop,
    DoubleBottom,
    Triangle,
    Wedge,
    // Harmonic
    Gartley,
    Butterfly,
    Bat,
    // Volume
    VolumeSpike,
    VolumeClimax,
    AccumulationDistribution,
}

impl PatternKind {
    /// Stable snake_case identifier, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            PatternKind::Doji => "doji",
            PatternKind::Hammer => "hammer",
            PatternKind::ShootingStar => "shooting_star",
            PatternKind::Engulfing => "engulfing",
            PatternKind::MorningStar => "morning_star",
            PatternKind::EveningStar => "evening_star",
            PatternKind::HeadShoulders => "head_shoulders",
            PatternKind::DoubleTop => "double_top",
            PatternKind::DoubleBottom => "double_bottom",
            PatternKind::Triangle => "triangle",
            PatternKind::Wedge => "wedge",
            PatternKind::Gartley => "gartley",
            PatternKind::Butterfly => "butterfly",
            PatternKind::Bat => "bat",
            PatternKind::VolumeSpike => "volume_spike",
            PatternKind::VolumeClimax => "volume_climax",
            PatternKind::AccumulationDistribution => "accumulation_distribution",
        }
    }

    pub fn family(self) -> PatternFamily {
        match self {
            PatternKind::Doji
            | PatternKind::Hammer
            | PatternKind::ShootingStar
            | PatternKind::Engulfing
            | PatternKind::MorningStar
            | PatternKind::EveningStar => PatternFamily::Candlestick,
            PatternKind::HeadShoulders
            | PatternKind::DoubleTop
            | PatternKind::DoubleBottom
            | PatternKind::Triangle
            | PatternKind::Wedge => PatternFamily::Chart,
            PatternKind::Gartley | PatternKind::Butterfly | PatternKind::Bat => {
                PatternFamily::Harmonic
            }
            PatternKind::VolumeSpike
            | PatternKind::VolumeClimax
            | PatternKind::AccumulationDistribution => PatternFamily::Volume,
        }
    }

    /// Confidence weight in percentage points: confidence = strength * weight.
    pub fn weight(self) -> f64 {
        match self {
            PatternKind::Doji => 60.0,
            PatternKind::Hammer | PatternKind::ShootingStar => 75.0,
            PatternKind::Engulfing => 80.0,
            PatternKind::MorningStar | PatternKind::EveningStar => 85.0,
            PatternKind::HeadShoulders | PatternKind::DoubleTop | PatternKind::DoubleBottom => {
                95.0
            }
            PatternKind::Triangle | PatternKind::Wedge => 85.0,
            PatternKind::Gartley | PatternKind::Butterfly | PatternKind::Bat => 90.0,
            PatternKind::VolumeSpike => 80.0,
            PatternKind::VolumeClimax => 85.0,
            PatternKind::AccumulationDistribution => 75.0,
        }
    }
}

/// A detected pattern occurrence
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub signal: Signal,
    /// Quality score 0.0..=1.0, local to the detector
    pub strength: f64,
    /// strength scaled to 0..=100 by the pattern weight, used for ranking
    pub confidence: f64,
    pub start_index: usize,
    pub end_index: usize,
    /// Human-readable explanation; not machine-parsed
    pub description: String,
}

impl PatternMatch {
    /// Build a match, clamping strength into [0, 1] and deriving confidence.
    pub fn new(
        kind: PatternKind,
        signal: Signal,
        strength: f64,
        start_index: usize,
        end_index: usize,
        description: impl Into<String>,
    ) -> Self {
        let strength = strength.clamp(0.0, 1.0);
        Self {
            kind,
            signal,
            strength,
            confidence: (strength * kind.weight()).clamp(0.0, 100.0),
            start_index,
            end_index,
            description: description.into(),
        }
    }

    #[inline]
    pub fn family(&self) -> PatternFamily {
        self.kind.family()
    }
}

// ============================================================
// DETECTOR TRAITS
// ============================================================

use swing::SwingPoint;

/// Per-bar candlestick detector - for concrete types (fast path)
pub trait CandleDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Object-safe candlestick detector - for custom detectors
pub trait DynCandleDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    fn min_bars(&self) -> usize;
    fn detect(&self, bars: &[&dyn Ohlcv], index: usize) -> Option<PatternMatch>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: CandleDetector> DynCandleDetector for D {
    fn kind(&self) -> PatternKind {
        CandleDetector::kind(self)
    }

    fn min_bars(&self) -> usize {
        CandleDetector::min_bars(self)
    }

    fn detect(&self, bars: &[&dyn Ohlcv], index: usize) -> Option<PatternMatch> {
        CandleDetector::detect(self, bars, index)
    }

    fn validate_config(&self) -> Result<()> {
        CandleDetector::validate_config(self)
    }
}

/// Whole-series detector over candles and their derived swing points.
///
/// Chart, harmonic and volume families implement this; a detector that finds
/// nothing returns an empty vec, never an error. Placeholder families
/// (triangle, wedge) satisfy the same contract and can be swapped for real
/// implementations without touching the aggregation logic.
pub trait SeriesDetector: Send + Sync {
    fn kind(&self) -> PatternKind;
    /// Minimum swing points needed; below this the scan is skipped entirely.
    fn min_swings(&self) -> usize;
    fn scan<T: Ohlcv>(&self, bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch>;

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;

/// Macro to generate the builtin candlestick enum without boilerplate
macro_rules! define_candle_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin candlestick detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinCandleDetector {
            $($variant($detector)),*
        }

        impl BuiltinCandleDetector {
            #[inline]
            pub fn detect<T: Ohlcv>(&self, bars: &[T], index: usize) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => CandleDetector::detect(d, bars, index)),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => CandleDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => CandleDetector::min_bars(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => CandleDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_candle_detectors! {
    Doji(DojiDetector),
    Hammer(HammerDetector),
    ShootingStar(ShootingStarDetector),
    Engulfing(EngulfingDetector),
    MorningStar(MorningStarDetector),
    EveningStar(EveningStarDetector),
}

/// Macro to generate the builtin series-scanner enum
macro_rules! define_scanners {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin whole-series detectors (chart, harmonic, volume)
        #[derive(Debug, Clone)]
        pub enum BuiltinScanner {
            $($variant($detector)),*
        }

        impl BuiltinScanner {
            #[inline]
            pub fn scan<T: Ohlcv>(&self, bars: &[T], swings: &[SwingPoint]) -> Vec<PatternMatch> {
                match self {
                    $(Self::$variant(d) => {
                        if swings.len() < SeriesDetector::min_swings(d) {
                            return Vec::new();
                        }
                        SeriesDetector::scan(d, bars, swings)
                    }),*
                }
            }

            #[inline]
            pub fn kind(&self) -> PatternKind {
                match self {
                    $(Self::$variant(d) => SeriesDetector::kind(d)),*
                }
            }

            #[inline]
            pub fn family(&self) -> PatternFamily {
                self.kind().family()
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => SeriesDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_scanners! {
    HeadShoulders(HeadShouldersDetector),
    DoubleTop(DoubleTopDetector),
    DoubleBottom(DoubleBottomDetector),
    Triangle(TriangleDetector),
    Wedge(WedgeDetector),
    Gartley(GartleyDetector),
    Butterfly(ButterflyDetector),
    Bat(BatDetector),
    VolumeSpike(VolumeSpikeDetector),
    VolumeClimax(VolumeClimaxDetector),
    AccumulationDistribution(AccumulationDistributionDetector),
}

// ============================================================
// PATTERN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Symmetric window for swing-point detection
    pub swing_window: Period,
    /// Candlestick results are ranked by confidence and truncated to this
    pub top_n: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            swing_window: Period::new_const(10),
            top_n: 10,
        }
    }
}

/// Detected patterns grouped by family
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detections {
    pub candlestick: Vec<PatternMatch>,
    pub chart: Vec<PatternMatch>,
    pub harmonic: Vec<PatternMatch>,
    pub volume: Vec<PatternMatch>,
}

impl Detections {
    /// Iterate over all matches, regardless of family.
    pub fn iter_all(&self) -> impl Iterator<Item = &PatternMatch> {
        self.candlestick
            .iter()
            .chain(self.chart.iter())
            .chain(self.harmonic.iter())
            .chain(self.volume.iter())
    }

    pub fn len(&self) -> usize {
        self.candlestick.len() + self.chart.len() + self.harmonic.len() + self.volume.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Threshold-filtered, confidence-ranked signals. See [`generate_signals`].
    pub fn signals(&self) -> Vec<PatternMatch> {
        generate_signals(self)
    }
}

/// Main pattern detection engine
pub struct PatternEngine {
    candlestick: Vec<BuiltinCandleDetector>,
    custom: Vec<Box<dyn DynCandleDetector>>,
    scanners: Vec<BuiltinScanner>,
    config: ScanConfig,
}

impl PatternEngine {
    /// Scan all bars and return matches grouped by family.
    ///
    /// Fails fast on the first structurally invalid candle. A family without
    /// enough data yields an empty list; "nothing found" is never an error.
    pub fn detect<T: Ohlcv>(&self, bars: &[T]) -> Result<Detections> {
        self.validate_bars(bars)?;

        let swings = swing::find_swing_points(bars, self.config.swing_window.get());

        let mut candlestick = Vec::new();
        if self.custom.is_empty() {
            for i in 0..bars.len() {
                self.scan_candles_at(bars, &[], i, &mut candlestick);
            }
        } else {
            let bar_refs: Vec<&dyn Ohlcv> = bars.iter().map(|b| b as &dyn Ohlcv).collect();
            for i in 0..bars.len() {
                self.scan_candles_at(bars, &bar_refs, i, &mut candlestick);
            }
        }
        sort_by_confidence(&mut candlestick);
        candlestick.truncate(self.config.top_n);

        let mut chart = Vec::new();
        let mut harmonic = Vec::new();
        let mut volume = Vec::new();
        for scanner in &self.scanners {
            let found = scanner.scan(bars, &swings);
            match scanner.family() {
                PatternFamily::Chart => chart.extend(found),
                PatternFamily::Harmonic => harmonic.extend(found),
                PatternFamily::Volume => volume.extend(found),
                PatternFamily::Candlestick => candlestick.extend(found),
            }
        }
        sort_by_confidence(&mut chart);
        sort_by_confidence(&mut harmonic);
        sort_by_confidence(&mut volume);

        tracing::debug!(
            bars = bars.len(),
            swings = swings.len(),
            candlestick = candlestick.len(),
            chart = chart.len(),
            harmonic = harmonic.len(),
            volume = volume.len(),
            "pattern scan complete"
        );

        Ok(Detections {
            candlestick,
            chart,
            harmonic,
            volume,
        })
    }

    /// Detect candlestick patterns at a single bar index.
    pub fn detect_at<T: Ohlcv>(&self, bars: &[T], index: usize) -> Vec<PatternMatch> {
        let mut results = Vec::new();
        if self.custom.is_empty() {
            self.scan_candles_at(bars, &[], index, &mut results);
        } else {
            let bar_refs: Vec<&dyn Ohlcv> = bars.iter().map(|b| b as &dyn Ohlcv).collect();
            self.scan_candles_at(bars, &bar_refs, index, &mut results);
        }
        results
    }

    /// Swing points for the configured window; exposed for callers that want
    /// to reuse them (e.g. charting overlays).
    pub fn swing_points<T: Ohlcv>(&self, bars: &[T]) -> Vec<SwingPoint> {
        swing::find_swing_points(bars, self.config.swing_window.get())
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    fn scan_candles_at<T: Ohlcv>(
        &self,
        bars: &[T],
        bar_refs: &[&dyn Ohlcv],
        index: usize,
        results: &mut Vec<PatternMatch>,
    ) {
        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.candlestick {
            if index + 1 >= detector.min_bars() {
                if let Some(m) = detector.detect(bars, index) {
                    results.push(m);
                }
            }
        }

        // Slow path: custom detectors (vtable)
        if !self.custom.is_empty() && !bar_refs.is_empty() {
            for detector in &self.custom {
                if index + 1 >= detector.min_bars() {
                    if let Some(m) = detector.detect(bar_refs, index) {
                        results.push(m);
                    }
                }
            }
        }
    }

    fn validate_bars<T: Ohlcv>(&self, bars: &[T]) -> Result<()> {
        for (i, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|e| match e {
                PatternError::InvalidCandle { reason, .. } => {
                    PatternError::InvalidCandle { index: i, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for d in &self.candlestick {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        for s in &self.scanners {
            s.validate_config()?;
        }
        Ok(())
    }
}

// ============================================================
// AGGREGATION
// ============================================================

/// Merge all families, drop matches at or below their family's confidence
/// threshold, and rank the rest by confidence descending.
pub fn generate_signals(detections: &Detections) -> Vec<PatternMatch> {
    let mut signals: Vec<PatternMatch> = detections
        .iter_all()
        .filter(|m| m.confidence > m.family().min_confidence())
        .cloned()
        .collect();
    sort_by_confidence(&mut signals);

    tracing::trace!(
        detected = detections.len(),
        emitted = signals.len(),
        "signal generation complete"
    );

    signals
}

/// Unweighted mean confidence across all detected patterns; 0.0 if none.
pub fn pattern_strength(detections: &Detections) -> f64 {
    let count = detections.len();
    if count == 0 {
        return 0.0;
    }
    detections.iter_all().map(|m| m.confidence).sum::<f64>() / count as f64
}

fn sort_by_confidence(matches: &mut [PatternMatch]) {
    // Confidence is clamped at construction, so it is always finite and
    // total_cmp gives a deterministic order.
    matches.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating PatternEngine instances
pub struct EngineBuilder {
    candlestick: Vec<BuiltinCandleDetector>,
    custom: Vec<Box<dyn DynCandleDetector>>,
    scanners: Vec<BuiltinScanner>,
    config: ScanConfig,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an array of enum variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($enum:ident: $($variant:ident),* $(,)?) => {
    [$($enum::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            candlestick: Vec::new(),
            custom: Vec::new(),
            scanners: Vec::new(),
            config: ScanConfig::default(),
        }
    }

    /// Add every builtin detector with default configuration
    pub fn with_all_defaults(self) -> Self {
        self.with_candlestick_defaults()
            .with_chart_defaults()
            .with_harmonic_defaults()
            .with_volume_defaults()
    }

    /// Add the candlestick detectors with defaults (6)
    pub fn with_candlestick_defaults(mut self) -> Self {
        self.candlestick.extend(builtin_defaults![
            BuiltinCandleDetector: Doji,
            Hammer,
            ShootingStar,
            Engulfing,
            MorningStar,
            EveningStar,
        ]);
        self
    }

    /// Add the chart-pattern scanners with defaults (5, two of them placeholders)
    pub fn with_chart_defaults(mut self) -> Self {
        self.scanners.extend(builtin_defaults![
            BuiltinScanner: HeadShoulders,
            DoubleTop,
            DoubleBottom,
            Triangle,
            Wedge,
        ]);
        self
    }

    /// Add the harmonic-pattern scanners with defaults (3)
    pub fn with_harmonic_defaults(mut self) -> Self {
        self.scanners.extend(builtin_defaults![
            BuiltinScanner: Gartley,
            Butterfly,
            Bat,
        ]);
        self
    }

    /// Add the volume scanners with defaults (3)
    pub fn with_volume_defaults(mut self) -> Self {
        self.scanners.extend(builtin_defaults![
            BuiltinScanner: VolumeSpike,
            VolumeClimax,
            AccumulationDistribution,
        ]);
        self
    }

    /// Add a builtin candlestick detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinCandleDetector) -> Self {
        self.candlestick.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinCandleDetector) -> Result<Self> {
        detector.validate_config()?;
        self.candlestick.push(detector);
        Ok(self)
    }

    /// Add a whole-series scanner
    pub fn add_scanner(mut self, scanner: BuiltinScanner) -> Self {
        self.scanners.push(scanner);
        self
    }

    /// Add a custom candlestick detector (slow path)
    pub fn add_custom<D: DynCandleDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Set the symmetric swing-point window
    pub fn swing_window(mut self, window: Period) -> Self {
        self.config.swing_window = window;
        self
    }

    /// Cap the number of ranked candlestick matches returned
    pub fn top_n(mut self, n: usize) -> Self {
        self.config.top_n = n;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<PatternEngine> {
        let engine = PatternEngine {
            candlestick: self.candlestick,
            custom: self.custom,
            scanners: self.scanners,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCANNING
// ============================================================

use rayon::prelude::*;

/// Result of scanning a single instrument
#[derive(Debug)]
pub struct ScanResult {
    pub symbol: String,
    pub detections: Detections,
}

/// Error from scanning a single instrument
#[derive(Debug)]
pub struct ScanError {
    pub symbol: String,
    pub error: PatternError,
}

/// Parallel scanning of multiple instruments.
///
/// Detection is pure, so independent inputs need no coordination.
pub fn scan_parallel<'a, T, I>(
    engine: &PatternEngine,
    instruments: I,
) -> (Vec<ScanResult>, Vec<ScanError>)
where
    T: Ohlcv + Sync + 'a,
    I: IntoParallelIterator<Item = (&'a str, &'a [T])>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, bars)| {
            engine
                .detect(bars)
                .map(|detections| ScanResult {
                    symbol: symbol.to_string(),
                    detections,
                })
                .map_err(|error| ScanError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

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

    fn make_downtrend_bars() -> Vec<Candle> {
        (0..20)
            .map(|i| {
                let base = 100.0 - i as f64 * 2.0;
                bar(base, base + 1.0, base - 1.0, base - 0.5)
            })
            .collect()
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_period_validation() {
        assert!(Period::new(1).is_ok());
        assert!(Period::new(100).is_ok());
        assert!(Period::new(0).is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let b = bar(100.0, 110.0, 90.0, 105.0);
        assert_eq!(b.body(), 5.0);
        assert_eq!(b.range(), 20.0);
        assert!(b.is_bullish());
        assert!(!b.is_bearish());
        assert!((b.body_ratio().unwrap() - 0.25).abs() < 0.001);
    }

    #[test]
    fn test_validate_rejects_inverted_candle() {
        let b = bar(100.0, 90.0, 110.0, 105.0); // high < low
        assert!(b.validate().is_err());
    }

    #[test]
    fn test_validate_reports_offending_index() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let mut bars = make_downtrend_bars();
        bars[7] = Candle {
            time: 0,
            open: 100.0,
            high: 90.0,
            low: 110.0,
            close: 105.0,
            volume: 1000.0,
        };

        match engine.detect(&bars) {
            Err(PatternError::InvalidCandle { index, .. }) => assert_eq!(index, 7),
            other => panic!("expected InvalidCandle, got {other:?}"),
        }
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new().with_all_defaults().build();
        assert!(engine.is_ok());
    }

    #[test]
    fn test_empty_scan() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let bars: Vec<Candle> = vec![];
        let detections = engine.detect(&bars).unwrap();
        assert!(detections.is_empty());
        assert!(generate_signals(&detections).is_empty());
    }

    #[test]
    fn test_doji_detection() {
        let engine = EngineBuilder::new()
            .add(BuiltinCandleDetector::Doji(DojiDetector::with_defaults()))
            .build()
            .unwrap();

        let bars = vec![bar(100.0, 110.0, 90.0, 100.5)];
        let detections = engine.detect(&bars).unwrap();
        assert!(!detections.candlestick.is_empty());
        assert_eq!(detections.candlestick[0].kind, PatternKind::Doji);
        assert_eq!(detections.candlestick[0].signal, Signal::Neutral);
    }

    #[test]
    fn test_top_n_truncation() {
        let engine = EngineBuilder::new()
            .add(BuiltinCandleDetector::Doji(DojiDetector::with_defaults()))
            .top_n(3)
            .build()
            .unwrap();

        let bars: Vec<Candle> = (0..10).map(|_| bar(100.0, 110.0, 90.0, 100.5)).collect();
        let detections = engine.detect(&bars).unwrap();
        assert_eq!(detections.candlestick.len(), 3);
    }

    #[test]
    fn test_candlestick_ranked_by_confidence() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let mut bars = make_downtrend_bars();
        bars.push(bar(60.0, 60.1, 50.0, 60.05));

        let detections = engine.detect(&bars).unwrap();
        for pair in detections.candlestick.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn test_detect_idempotent() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let mut bars = make_downtrend_bars();
        bars.push(bar(60.0, 60.1, 50.0, 60.05));

        let first = engine.detect(&bars).unwrap();
        let second = engine.detect(&bars).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_pattern_strength_empty() {
        assert_eq!(pattern_strength(&Detections::default()), 0.0);
    }

    #[test]
    fn test_pattern_strength_mean() {
        let detections = Detections {
            candlestick: vec![
                PatternMatch::new(PatternKind::Hammer, Signal::Buy, 1.0, 0, 0, "a"),
                PatternMatch::new(PatternKind::Doji, Signal::Neutral, 0.5, 1, 1, "b"),
            ],
            ..Default::default()
        };
        // (75 + 30) / 2
        assert!((pattern_strength(&detections) - 52.5).abs() < 1e-9);
    }

    #[test]
    fn test_generate_signals_applies_family_thresholds() {
        let detections = Detections {
            candlestick: vec![
                // doji caps at confidence 60, always below the 70 threshold
                PatternMatch::new(PatternKind::Doji, Signal::Neutral, 1.0, 0, 0, "doji"),
                PatternMatch::new(PatternKind::Hammer, Signal::Buy, 0.99, 1, 1, "hammer"),
            ],
            chart: vec![PatternMatch::new(
                PatternKind::DoubleTop,
                Signal::Sell,
                0.8,
                2,
                5,
                "double top",
            )],
            ..Default::default()
        };

        let signals = generate_signals(&detections);
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|s| s.kind != PatternKind::Doji));
        // sorted by confidence descending: double top 76.0 > hammer 74.25
        assert_eq!(signals[0].kind, PatternKind::DoubleTop);
    }

    #[test]
    fn test_pattern_match_serde_shape() {
        let m = PatternMatch::new(
            PatternKind::ShootingStar,
            Signal::Sell,
            0.9,
            4,
            5,
            "shooting star",
        );
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["kind"], PatternKind::ShootingStar.as_str());
        assert_eq!(json["signal"], "SELL");
        assert_eq!(json["confidence"], 0.9 * 75.0);
    }

    #[test]
    fn test_parallel_scan() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

        let bars1 = make_downtrend_bars();
        let bars2: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                bar(base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();

        let instruments: Vec<(&str, &[Candle])> = vec![("BTC", &bars1), ("ETH", &bars2)];

        let (results, errors) = scan_parallel(&engine, instruments);
        assert_eq!(results.len(), 2);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_parallel_scan_reports_per_symbol_errors() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();

        let good = make_downtrend_bars();
        let bad = vec![Candle {
            time: 0,
            open: 100.0,
            high: 90.0,
            low: 110.0,
            close: 105.0,
            volume: 1.0,
        }];

        let instruments: Vec<(&str, &[Candle])> = vec![("GOOD", &good), ("BAD", &bad)];
        let (results, errors) = scan_parallel(&engine, instruments);
        assert_eq!(results.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].symbol, "BAD");
    }
}
