use std::cmp::Ordering;

use crate::{periodogram, Periodogram};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LightCurveError {
    #[error("time ({time}), flux ({flux}) and flux error ({flux_err}) lengths differ")]
    Length {
        time: usize,
        flux: usize,
        flux_err: usize,
    },
    #[error("the light curve is empty")]
    Empty,
    #[error("cannot normalize by a median flux of {0}")]
    Median(f64),
    #[error("cannot fold on a period of {0}")]
    Period(f64),
}
type Result<T> = std::result::Result<T, LightCurveError>;

/// Median of the finite values of `x`
pub fn median(x: &[f64]) -> Option<f64> {
    let mut values: Vec<f64> = x.iter().cloned().filter(|x| x.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 0 {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    } else {
        values[n / 2]
    })
}

/// Iterative sigma clipping around the median
///
/// Returns the mask of the values that are kept; non finite values are always rejected.
pub fn sigma_clip(x: &[f64], sigma: f64, max_iters: usize) -> Vec<bool> {
    let mut keep: Vec<bool> = x.iter().map(|x| x.is_finite()).collect();
    for _ in 0..max_iters {
        let kept: Vec<f64> = x
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(x, _)| *x)
            .collect();
        let Some(center) = median(&kept) else {
            break;
        };
        let n = kept.len() as f64;
        let mean = kept.iter().sum::<f64>() / n;
        let std = (kept.iter().map(|x| x - mean).fold(0f64, |s, x| s + x * x) / n).sqrt();
        let mut clipped = 0;
        for (x, k) in x.iter().zip(keep.iter_mut()).filter(|(_, k)| **k) {
            if (x - center).abs() > sigma * std {
                *k = false;
                clipped += 1;
            }
        }
        if clipped == 0 {
            break;
        }
    }
    keep
}

/// Simple aperture photometry time series
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightCurve {
    /// time [BKJD days]
    time: Vec<f64>,
    /// flux [e-/s]
    flux: Vec<f64>,
    /// flux uncertainty [e-/s]
    flux_err: Vec<f64>,
}
impl LightCurve {
    pub fn new(time: Vec<f64>, flux: Vec<f64>, flux_err: Vec<f64>) -> Result<Self> {
        if time.len() != flux.len() || time.len() != flux_err.len() {
            return Err(LightCurveError::Length {
                time: time.len(),
                flux: flux.len(),
                flux_err: flux_err.len(),
            });
        }
        Ok(Self {
            time,
            flux,
            flux_err,
        })
    }
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn time(&self) -> &[f64] {
        &self.time
    }
    pub fn flux(&self) -> &[f64] {
        &self.flux
    }
    pub fn flux_err(&self) -> &[f64] {
        &self.flux_err
    }
    /// Iterator over `(time, flux, flux_err)`
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        self.time
            .iter()
            .zip(&self.flux)
            .zip(&self.flux_err)
            .map(|((&t, &f), &e)| (t, f, e))
    }
    fn select(&self, keep: &[bool]) -> Self {
        let (mut time, mut flux, mut flux_err) = (vec![], vec![], vec![]);
        for ((t, f, e), _) in self.iter().zip(keep).filter(|(_, k)| **k) {
            time.push(t);
            flux.push(f);
            flux_err.push(e);
        }
        Self {
            time,
            flux,
            flux_err,
        }
    }
    /// Removes the cadences which flux is more than `sigma` standard deviations
    /// away from the median
    pub fn remove_outliers(&self, sigma: f64) -> Self {
        let keep = sigma_clip(&self.flux, sigma, 5);
        let lc = self.select(&keep);
        log::debug!("{} outliers removed", self.len() - lc.len());
        lc
    }
    /// Divides the flux and its uncertainty by the median flux
    pub fn normalize(&self) -> Result<Self> {
        if self.is_empty() {
            return Err(LightCurveError::Empty);
        }
        let m = median(&self.flux).unwrap_or(f64::NAN);
        if !m.is_finite() || m == 0f64 {
            return Err(LightCurveError::Median(m));
        }
        Ok(Self {
            time: self.time.clone(),
            flux: self.flux.iter().map(|f| f / m).collect(),
            flux_err: self.flux_err.iter().map(|e| e / m).collect(),
        })
    }
    /// Folds the light curve on `period` days, using the first cadence as the epoch
    pub fn fold(&self, period: f64) -> Result<FoldedLightCurve> {
        if !period.is_finite() || period <= 0f64 {
            return Err(LightCurveError::Period(period));
        }
        let epoch = *self.time.first().ok_or(LightCurveError::Empty)?;
        let mut folded: Vec<(f64, f64, f64)> = self
            .iter()
            .map(|(t, f, e)| {
                let phase = ((t - epoch) / period).rem_euclid(1f64);
                (if phase >= 0.5 { phase - 1f64 } else { phase }, f, e)
            })
            .collect();
        folded.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let (phase, (flux, flux_err)): (Vec<_>, (Vec<_>, Vec<_>)) =
            folded.into_iter().map(|(p, f, e)| (p, (f, e))).unzip();
        Ok(FoldedLightCurve {
            period,
            epoch,
            phase,
            flux,
            flux_err,
        })
    }
    /// Lomb-Scargle periodogram of the light curve
    pub fn to_periodogram(&self, oversample_factor: f64) -> periodogram::Result<Periodogram> {
        Periodogram::lomb_scargle(self, oversample_factor)
    }
}

/// Light curve folded on a period, sorted by phase
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedLightCurve {
    /// folding period [days]
    pub period: f64,
    /// time of phase 0 [BKJD days]
    pub epoch: f64,
    /// phase in `[-0.5, 0.5)`, a half period offset maps to -0.5
    pub phase: Vec<f64>,
    pub flux: Vec<f64>,
    pub flux_err: Vec<f64>,
}
impl FoldedLightCurve {
    pub fn len(&self) -> usize {
        self.phase.len()
    }
    pub fn is_empty(&self) -> bool {
        self.phase.is_empty()
    }
}
