//! Lomb-Scargle periodogram
//!
//! The periodogram is evaluated on a regular frequency grid with a resolution of
//! `1/(T * oversample_factor)`, `T` being the light curve time span, from that
//! resolution up to the Nyquist frequency of the median sampling interval.
//! The power is given as an amplitude, i.e. `sqrt(4 P / N)` where `P` is the
//! PSD-normalized Lomb-Scargle power of the mean subtracted flux.

use crate::{lightcurve::median, LightCurve};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PeriodogramError {
    #[error("at least 3 finite cadences are required, found {0}")]
    TooShort(usize),
    #[error("invalid time baseline: {0}")]
    Baseline(f64),
    #[error("invalid oversampling factor: {0}")]
    Oversample(f64),
    #[error("the frequency grid is empty")]
    EmptyGrid,
    #[error("frequency ({0}) and amplitude ({1}) lengths differ")]
    Length(usize, usize),
    #[error("frequencies must be finite and strictly positive")]
    Frequency,
}
pub type Result<T> = std::result::Result<T, PeriodogramError>;

/// Amplitude spectrum of a light curve
#[derive(Debug, Clone, PartialEq)]
pub struct Periodogram {
    /// frequency [1/day]
    frequency: Vec<f64>,
    /// period [day]
    period: Vec<f64>,
    /// amplitude [flux]
    amplitude: Vec<f64>,
}
impl Periodogram {
    pub fn new(frequency: Vec<f64>, amplitude: Vec<f64>) -> Result<Self> {
        if frequency.len() != amplitude.len() {
            return Err(PeriodogramError::Length(frequency.len(), amplitude.len()));
        }
        if frequency.is_empty() {
            return Err(PeriodogramError::EmptyGrid);
        }
        if frequency.iter().any(|f| !f.is_finite() || *f <= 0f64) {
            return Err(PeriodogramError::Frequency);
        }
        let period = frequency.iter().map(|f| 1f64 / f).collect();
        Ok(Self {
            frequency,
            period,
            amplitude,
        })
    }
    /// Computes the Lomb-Scargle periodogram of the light curve
    pub fn lomb_scargle(lc: &LightCurve, oversample_factor: f64) -> Result<Self> {
        if !oversample_factor.is_finite() || oversample_factor <= 0f64 {
            return Err(PeriodogramError::Oversample(oversample_factor));
        }
        let (time, flux): (Vec<f64>, Vec<f64>) = lc
            .iter()
            .filter(|(t, f, _)| t.is_finite() && f.is_finite())
            .map(|(t, f, _)| (t, f))
            .unzip();
        let n = time.len();
        if n < 3 {
            return Err(PeriodogramError::TooShort(n));
        }
        let baseline = time[n - 1] - time[0];
        if !(baseline.is_finite() && baseline > 0f64) {
            return Err(PeriodogramError::Baseline(baseline));
        }
        let dt: Vec<f64> = time.windows(2).map(|t| t[1] - t[0]).collect();
        let nyquist = median(&dt)
            .filter(|dt| *dt > 0f64)
            .map(|dt| 0.5 / dt)
            .ok_or(PeriodogramError::Baseline(baseline))?;
        let df = 1f64 / (baseline * oversample_factor);
        let frequency: Vec<f64> = (1..)
            .map(|k| k as f64 * df)
            .take_while(|f| *f < nyquist)
            .collect();
        log::info!(
            "Lomb-Scargle periodogram of {} cadences over {} frequencies",
            n,
            frequency.len()
        );

        let mean = flux.iter().sum::<f64>() / n as f64;
        let y: Vec<f64> = flux.iter().map(|f| f - mean).collect();
        let amplitude = frequency
            .iter()
            .map(|f| (4f64 * psd_power(&time, &y, *f) / n as f64).sqrt())
            .collect();
        Self::new(frequency, amplitude)
    }
    pub fn len(&self) -> usize {
        self.frequency.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frequency.is_empty()
    }
    pub fn frequency(&self) -> &[f64] {
        &self.frequency
    }
    pub fn period(&self) -> &[f64] {
        &self.period
    }
    pub fn amplitude(&self) -> &[f64] {
        &self.amplitude
    }
    /// Index of the first maximum of the amplitude
    fn argmax(&self) -> usize {
        self.amplitude
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(i_max, a_max), (i, &a)| {
                if a > a_max {
                    (i, a)
                } else {
                    (i_max, a_max)
                }
            })
            .0
    }
    pub fn max_power(&self) -> f64 {
        self.amplitude[self.argmax()]
    }
    pub fn frequency_at_max_power(&self) -> f64 {
        self.frequency[self.argmax()]
    }
    /// Period [day] of the highest amplitude
    pub fn period_at_max_power(&self) -> f64 {
        self.period[self.argmax()]
    }
}

/// Classical Lomb-Scargle power (PSD normalization) of the centered data `y` at frequency `f`
fn psd_power(t: &[f64], y: &[f64], f: f64) -> f64 {
    let omega = 2f64 * std::f64::consts::PI * f;
    let (s2, c2) = t.iter().fold((0f64, 0f64), |(s, c), t| {
        let (sin, cos) = (2f64 * omega * t).sin_cos();
        (s + sin, c + cos)
    });
    let tau = 0.5 * s2.atan2(c2) / omega;
    let (mut yc, mut ys, mut cc, mut ss) = (0f64, 0f64, 0f64, 0f64);
    for (t, y) in t.iter().zip(y) {
        let (sin, cos) = (omega * (t - tau)).sin_cos();
        yc += y * cos;
        ys += y * sin;
        cc += cos * cos;
        ss += sin * sin;
    }
    let term = |num: f64, den: f64| if den > 0f64 { num * num / den } else { 0f64 };
    0.5 * (term(yc, cc) + term(ys, ss))
}
