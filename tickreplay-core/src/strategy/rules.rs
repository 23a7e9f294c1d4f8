//! Reusable rule shapes behind the built-in strategies.
//!
//! Every rule reads named indicator columns from the window. A missing column,
//! a NaN value, or a window shorter than the rule's lookback votes 0.

use super::{IndicatorWindow, Strategy};

fn vote_of(up: bool, down: bool) -> i8 {
    i8::from(up) - i8::from(down)
}

fn sign_of(a: f64, b: f64) -> i8 {
    vote_of(a > b, a < b)
}

// ─── Zero-line cross ───────────────────────────────────────────

/// Votes when a series crosses zero between the previous bar and the latest.
#[derive(Debug, Clone)]
pub struct ZeroCross {
    name: String,
    column: String,
}

impl ZeroCross {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }

    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let cur = w.last(&self.column)?;
        let prev = w.prev(&self.column)?;
        Some(vote_of(prev < 0.0 && cur > 0.0, prev > 0.0 && cur < 0.0))
    }
}

impl Strategy for ZeroCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

// ─── Line cross ───────────────────────────────────────────

/// Votes when `fast` crosses `slow` between the previous bar and the latest.
#[derive(Debug, Clone)]
pub struct LineCross {
    name: String,
    fast: String,
    slow: String,
}

impl LineCross {
    pub fn new(name: impl Into<String>, fast: impl Into<String>, slow: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fast: fast.into(),
            slow: slow.into(),
        }
    }

    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let (fast, slow) = (w.last(&self.fast)?, w.last(&self.slow)?);
        let (prev_fast, prev_slow) = (w.prev(&self.fast)?, w.prev(&self.slow)?);
        Some(vote_of(
            fast > slow && prev_fast < prev_slow,
            fast < slow && prev_fast > prev_slow,
        ))
    }
}

impl Strategy for LineCross {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

// ─── Band breakout ───────────────────────────────────────────

/// Long when the close breaks above the upper band, short below the lower band.
#[derive(Debug, Clone)]
pub struct BandBreakout {
    name: String,
    upper: String,
    lower: String,
}

impl BandBreakout {
    pub fn new(name: impl Into<String>, upper: impl Into<String>, lower: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            upper: upper.into(),
            lower: lower.into(),
        }
    }

    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let close = w.last("close")?;
        Some(vote_of(
            close > w.last(&self.upper)?,
            close < w.last(&self.lower)?,
        ))
    }
}

impl Strategy for BandBreakout {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

// ─── Spread ───────────────────────────────────────────

/// Sign of `a - b` on the latest bar.
#[derive(Debug, Clone)]
pub struct Spread {
    name: String,
    a: String,
    b: String,
}

impl Spread {
    pub fn new(name: impl Into<String>, a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            a: a.into(),
            b: b.into(),
        }
    }
}

impl Strategy for Spread {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        match (window.last(&self.a), window.last(&self.b)) {
            (Some(a), Some(b)) => sign_of(a, b),
            _ => 0,
        }
    }
}

// ─── Threshold level ───────────────────────────────────────────

/// Compares a level against fixed bounds.
///
/// Trend-following: above `upper` is long, below `lower` is short.
/// Contrarian: below `lower` is long (oversold), above `upper` is short.
#[derive(Debug, Clone)]
pub struct Threshold {
    name: String,
    column: String,
    upper: f64,
    lower: f64,
    contrarian: bool,
}

impl Threshold {
    pub fn trend(name: impl Into<String>, column: impl Into<String>, upper: f64, lower: f64) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            upper,
            lower,
            contrarian: false,
        }
    }

    pub fn contrarian(
        name: impl Into<String>,
        column: impl Into<String>,
        upper: f64,
        lower: f64,
    ) -> Self {
        Self {
            contrarian: true,
            ..Self::trend(name, column, upper, lower)
        }
    }
}

impl Strategy for Threshold {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        1
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        let Some(v) = window.last(&self.column) else {
            return 0;
        };
        let (above, below) = (v > self.upper, v < self.lower);
        if self.contrarian {
            vote_of(below, above)
        } else {
            vote_of(above, below)
        }
    }
}

// ─── Slope ───────────────────────────────────────────

/// Direction of the latest bar-to-bar change.
#[derive(Debug, Clone)]
pub struct Slope {
    name: String,
    column: String,
}

impl Slope {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

impl Strategy for Slope {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        2
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        match (window.last(&self.column), window.prev(&self.column)) {
            (Some(cur), Some(prev)) => sign_of(cur, prev),
            _ => 0,
        }
    }
}

// ─── RSI stack ───────────────────────────────────────────

/// Long when short, medium and long RSI are stacked upward and the medium one
/// sits above the midline; mirrored for short.
#[derive(Debug, Clone)]
pub struct RsiStack {
    midline: f64,
}

impl RsiStack {
    pub fn new(midline: f64) -> Self {
        Self { midline }
    }

    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let (fast, mid, slow) = (w.last("rsi_5")?, w.last("rsi_14")?, w.last("rsi_30")?);
        Some(vote_of(
            fast > mid && mid > slow && mid > self.midline,
            fast < mid && mid < slow && mid < self.midline,
        ))
    }
}

impl Default for RsiStack {
    fn default() -> Self {
        Self::new(50.0)
    }
}

impl Strategy for RsiStack {
    fn name(&self) -> &str {
        "rsi"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

// ─── ADX / DI trend ───────────────────────────────────────────

/// Trades the dominant directional index while ADX confirms a trend.
#[derive(Debug, Clone)]
pub struct AdxTrend {
    threshold: f64,
}

impl AdxTrend {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let adx = w.last("adx")?;
        let (plus, minus) = (w.last("di_plus")?, w.last("di_minus")?);
        if adx <= self.threshold {
            return Some(0);
        }
        Some(sign_of(plus, minus))
    }
}

impl Default for AdxTrend {
    fn default() -> Self {
        Self::new(25.0)
    }
}

impl Strategy for AdxTrend {
    fn name(&self) -> &str {
        "adx"
    }

    fn lookback(&self) -> usize {
        1
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

// ─── Composites ───────────────────────────────────────────

fn macd_hist_slope(w: &IndicatorWindow<'_>) -> Option<i8> {
    Some(sign_of(w.last("macd_hist")?, w.prev("macd_hist")?))
}

/// Short MA crossover confirmed by the ma20/ma50 trend and a rising MACD histogram.
#[derive(Debug, Clone)]
pub struct MaMomentum {
    cross: LineCross,
}

impl Default for MaMomentum {
    fn default() -> Self {
        Self {
            cross: LineCross::new("ma5", "ma5", "ma20"),
        }
    }
}

impl MaMomentum {
    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        let trend = sign_of(w.last("ma20")?, w.last("ma50")?);
        let hist = macd_hist_slope(w)?;
        let cross = self.cross.vote(w);
        Some(if trend != 0 && trend == hist && trend == cross {
            trend
        } else {
            0
        })
    }
}

impl Strategy for MaMomentum {
    fn name(&self) -> &str {
        "momentum"
    }

    fn lookback(&self) -> usize {
        2
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

/// Net Bollinger band breakouts over recent bars, confirmed by the MACD histogram slope.
#[derive(Debug, Clone)]
pub struct BollingerMomentum {
    bars: usize,
}

impl Default for BollingerMomentum {
    fn default() -> Self {
        Self { bars: 5 }
    }
}

impl BollingerMomentum {
    fn eval(&self, w: &IndicatorWindow<'_>) -> Option<i8> {
        if w.len() < self.bars {
            return None;
        }
        let mut net = 0i32;
        for back in 0..self.bars {
            let close = w.value("close", back)?;
            let upper = w.value("upper_band", back)?;
            let lower = w.value("lower_band", back)?;
            net += i32::from(vote_of(close > upper, close < lower));
        }
        let hist = macd_hist_slope(w)?;
        Some(match net.signum() {
            1 if hist == 1 => 1,
            -1 if hist == -1 => -1,
            _ => 0,
        })
    }
}

impl Strategy for BollingerMomentum {
    fn name(&self) -> &str {
        "momentum_bollinger"
    }

    fn lookback(&self) -> usize {
        self.bars
    }

    fn vote(&self, window: &IndicatorWindow<'_>) -> i8 {
        self.eval(window).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::IndicatorFrame;
    use chrono::{NaiveDate, NaiveDateTime};

    fn bars(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::minutes(i as i64))
            .collect()
    }

    fn frame(columns: &[(&str, Vec<f64>)]) -> IndicatorFrame {
        let n = columns[0].1.len();
        let mut f = IndicatorFrame::new(bars(n)).unwrap();
        for (name, values) in columns {
            f.insert_column(*name, values.clone()).unwrap();
        }
        f
    }

    fn vote(s: &dyn Strategy, f: &IndicatorFrame) -> i8 {
        s.vote(&f.tail(20).unwrap())
    }

    #[test]
    fn zero_cross_fires_only_on_the_crossing_bar() {
        let s = ZeroCross::new("macd", "macd_hist");
        assert_eq!(vote(&s, &frame(&[("macd_hist", vec![-0.5, 0.2])])), 1);
        assert_eq!(vote(&s, &frame(&[("macd_hist", vec![0.5, -0.2])])), -1);
        assert_eq!(vote(&s, &frame(&[("macd_hist", vec![0.1, 0.2])])), 0);
    }

    #[test]
    fn too_short_window_votes_zero() {
        let s = ZeroCross::new("macd", "macd_hist");
        assert_eq!(vote(&s, &frame(&[("macd_hist", vec![0.2])])), 0);
    }

    #[test]
    fn line_cross_requires_prior_opposite_ordering() {
        let s = LineCross::new("ma5", "ma5", "ma20");
        let up = frame(&[("ma5", vec![9.0, 11.0]), ("ma20", vec![10.0, 10.0])]);
        let stay = frame(&[("ma5", vec![11.0, 12.0]), ("ma20", vec![10.0, 10.0])]);
        assert_eq!(vote(&s, &up), 1);
        assert_eq!(vote(&s, &stay), 0);
    }

    #[test]
    fn band_breakout_reads_close() {
        let s = BandBreakout::new("donchian", "donchian_hband", "donchian_lband");
        let f = frame(&[
            ("close", vec![90.0]),
            ("donchian_hband", vec![110.0]),
            ("donchian_lband", vec![95.0]),
        ]);
        assert_eq!(vote(&s, &f), -1);
    }

    #[test]
    fn contrarian_threshold_inverts() {
        let s = Threshold::contrarian("williams_r", "williams_r", -20.0, -80.0);
        assert_eq!(vote(&s, &frame(&[("williams_r", vec![-90.0])])), 1);
        assert_eq!(vote(&s, &frame(&[("williams_r", vec![-10.0])])), -1);
        assert_eq!(vote(&s, &frame(&[("williams_r", vec![-50.0])])), 0);

        let t = Threshold::trend("cci", "cci", 100.0, -100.0);
        assert_eq!(vote(&t, &frame(&[("cci", vec![150.0])])), 1);
    }

    #[test]
    fn rsi_stack_needs_all_three_conditions() {
        let s = RsiStack::default();
        let long = frame(&[
            ("rsi_5", vec![70.0]),
            ("rsi_14", vec![60.0]),
            ("rsi_30", vec![55.0]),
        ]);
        let mixed = frame(&[
            ("rsi_5", vec![70.0]),
            ("rsi_14", vec![45.0]),
            ("rsi_30", vec![40.0]),
        ]);
        assert_eq!(vote(&s, &long), 1);
        assert_eq!(vote(&s, &mixed), 0);
    }

    #[test]
    fn adx_trend_follows_dominant_di() {
        let s = AdxTrend::default();
        let strong = frame(&[
            ("adx", vec![30.0]),
            ("di_plus", vec![10.0]),
            ("di_minus", vec![20.0]),
        ]);
        let weak = frame(&[
            ("adx", vec![15.0]),
            ("di_plus", vec![10.0]),
            ("di_minus", vec![20.0]),
        ]);
        assert_eq!(vote(&s, &strong), -1);
        assert_eq!(vote(&s, &weak), 0);
    }

    #[test]
    fn nan_input_votes_zero() {
        let s = Spread::new("vortex", "vi_plus", "vi_minus");
        let f = frame(&[("vi_plus", vec![f64::NAN]), ("vi_minus", vec![1.0])]);
        assert_eq!(vote(&s, &f), 0);
    }

    #[test]
    fn ma_momentum_requires_agreement() {
        let s = MaMomentum::default();
        let f = frame(&[
            ("ma5", vec![9.0, 11.0]),
            ("ma20", vec![10.0, 10.0]),
            ("ma50", vec![8.0, 8.0]),
            ("macd_hist", vec![0.1, 0.3]),
        ]);
        assert_eq!(vote(&s, &f), 1);

        let falling_hist = frame(&[
            ("ma5", vec![9.0, 11.0]),
            ("ma20", vec![10.0, 10.0]),
            ("ma50", vec![8.0, 8.0]),
            ("macd_hist", vec![0.3, 0.1]),
        ]);
        assert_eq!(vote(&s, &falling_hist), 0);
    }

    #[test]
    fn bollinger_momentum_counts_recent_breakouts() {
        let s = BollingerMomentum::default();
        let f = frame(&[
            ("close", vec![100.0, 106.0, 100.0, 100.0, 100.0]),
            ("upper_band", vec![105.0; 5]),
            ("lower_band", vec![95.0; 5]),
            ("macd_hist", vec![0.0, 0.0, 0.0, 0.1, 0.2]),
        ]);
        assert_eq!(vote(&s, &f), 1);
        assert_eq!(s.vote(&f.tail(4).unwrap()), 0);
    }
}
