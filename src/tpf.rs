//! Kepler/K2 target pixel files
//!
//! A target pixel file holds, in its `TARGETTABLES` extension, the time series of
//! the pixels around a target (`TIME`, `FLUX`, `FLUX_ERR`, `QUALITY` columns) and,
//! in its `APERTURE` extension, the bit mask of the pixels used by the mission
//! pipeline for the photometry.

use std::{
    fmt,
    io::{self, Write},
    path::{Path, PathBuf},
};

use fitsio::{hdu::HduInfo, FitsFile};

use crate::{time, LightCurve, LightCurveError};

/// Quality flags of the cadences discarded on load (Kepler default bitmask)
pub const DEFAULT_QUALITY_BITMASK: i32 = 1130799;
/// Bit of the `APERTURE` image flagging the pixels of the pipeline aperture
pub const PIPELINE_APERTURE_BIT: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum TpfError {
    #[error("failed to read {0:?}")]
    Fits(PathBuf, #[source] fitsio::errors::Error),
    #[error("{0} is not an image extension")]
    NotAnImage(String),
    #[error("{column} has {values} values for {cadences} cadences")]
    ColumnLength {
        column: String,
        values: usize,
        cadences: usize,
    },
    #[error("flux has {flux} pixels per cadence but the aperture has {aperture}")]
    Aperture { flux: usize, aperture: usize },
    #[error("the aperture mask selects no pixel")]
    EmptyAperture,
    #[error("failed to build the light curve")]
    LightCurve(#[from] LightCurveError),
}
type Result<T> = std::result::Result<T, TpfError>;

/// Boolean pixel mask
#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    /// (rows, columns)
    shape: (usize, usize),
    mask: Vec<bool>,
}
impl Aperture {
    pub fn new(shape: (usize, usize), mask: Vec<bool>) -> Self {
        Self { shape, mask }
    }
    /// Selects the pixels of an `APERTURE` image with `bit` set
    pub fn from_bitmask(shape: (usize, usize), values: &[i32], bit: i32) -> Self {
        Self::new(shape, values.iter().map(|v| v & bit != 0).collect())
    }
    /// Selects every pixel
    pub fn all(shape: (usize, usize)) -> Self {
        Self::new(shape, vec![true; shape.0 * shape.1])
    }
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }
    pub fn len(&self) -> usize {
        self.mask.len()
    }
    pub fn is_empty(&self) -> bool {
        self.mask.is_empty()
    }
    /// Number of selected pixels
    pub fn pixel_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }
}

/// Observation summary of a target pixel file
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub mission: String,
    pub quarter: Option<i64>,
    pub campaign: Option<i64>,
    /// first and last cadence in UTC
    pub time_range: Option<(String, String)>,
}
impl Metadata {
    /// Writes the mission, quarter and time range lines
    pub fn report<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "Mission:  {}", self.mission)?;
        match (self.quarter, self.campaign) {
            (Some(quarter), _) => writeln!(writer, "Quarter:  {quarter}")?,
            (None, Some(campaign)) => writeln!(writer, "Quarter:  None (campaign {campaign})")?,
            (None, None) => writeln!(writer, "Quarter:  None")?,
        }
        match &self.time_range {
            Some((start, end)) => writeln!(writer, "Time:  {start} .. {end}"),
            None => writeln!(writer, "Time:  None"),
        }
    }
}
impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Vec::new();
        self.report(&mut buffer).map_err(|_| fmt::Error)?;
        write!(f, "{}", String::from_utf8_lossy(&buffer))
    }
}

/// Target pixel data of a single target
#[derive(Debug, Clone)]
pub struct TargetPixelFile {
    pub mission: String,
    pub quarter: Option<i64>,
    pub campaign: Option<i64>,
    pub object: Option<String>,
    /// time [BKJD days]
    time: Vec<f64>,
    /// cadence major pixel fluxes [e-/s]
    flux: Vec<f64>,
    flux_err: Vec<f64>,
    quality: Vec<i32>,
    pipeline_mask: Aperture,
}
impl TargetPixelFile {
    /// Reads a target pixel file, discarding the cadences flagged by [DEFAULT_QUALITY_BITMASK]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_bitmask(path, DEFAULT_QUALITY_BITMASK)
    }
    pub fn open_with_bitmask<P: AsRef<Path>>(path: P, quality_bitmask: i32) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Reading {:?}...", path);
        let fits_err = |e| TpfError::Fits(path.to_path_buf(), e);
        let mut fits = FitsFile::open(path).map_err(fits_err)?;

        let primary = fits.primary_hdu().map_err(fits_err)?;
        let text = |fits: &mut FitsFile, key: &str| primary.read_key::<String>(fits, key).ok();
        let telescope = text(&mut fits, "TELESCOP");
        let mission = text(&mut fits, "MISSION")
            .or(telescope)
            .unwrap_or_else(|| String::from("unknown"));
        let object = text(&mut fits, "OBJECT");
        let quarter = primary.read_key::<i64>(&mut fits, "QUARTER").ok();
        let campaign = primary.read_key::<i64>(&mut fits, "CAMPAIGN").ok();

        let table = fits
            .hdu("TARGETTABLES")
            .or_else(|_| fits.hdu(1usize))
            .map_err(fits_err)?;
        let time: Vec<f64> = table.read_col(&mut fits, "TIME").map_err(fits_err)?;
        let quality: Vec<i32> = table.read_col(&mut fits, "QUALITY").map_err(fits_err)?;
        let cadences = time.len();
        if quality.len() != cadences {
            return Err(TpfError::ColumnLength {
                column: "QUALITY".into(),
                values: quality.len(),
                cadences,
            });
        }
        let flux: Vec<f64> = table.read_col(&mut fits, "FLUX").map_err(fits_err)?;
        let flux_err: Vec<f64> = table.read_col(&mut fits, "FLUX_ERR").map_err(fits_err)?;
        for (column, values) in [("FLUX", flux.len()), ("FLUX_ERR", flux_err.len())] {
            let misaligned = if cadences == 0 {
                values != 0
            } else {
                values % cadences != 0
            };
            if misaligned || values != flux.len() {
                return Err(TpfError::ColumnLength {
                    column: column.into(),
                    values,
                    cadences,
                });
            }
        }

        let aperture = fits
            .hdu("APERTURE")
            .or_else(|_| fits.hdu(2usize))
            .map_err(fits_err)?;
        let shape = match &aperture.info {
            HduInfo::ImageInfo { shape, .. } if shape.len() == 2 => (shape[0], shape[1]),
            _ => return Err(TpfError::NotAnImage("APERTURE".into())),
        };
        let values: Vec<i32> = aperture.read_image(&mut fits).map_err(fits_err)?;
        let pipeline_mask = Aperture::from_bitmask(shape, &values, PIPELINE_APERTURE_BIT);
        if cadences > 0 && flux.len() != cadences * pipeline_mask.len() {
            return Err(TpfError::Aperture {
                flux: flux.len() / cadences,
                aperture: pipeline_mask.len(),
            });
        }

        let tpf = Self {
            mission,
            quarter,
            campaign,
            object,
            time,
            flux,
            flux_err,
            quality,
            pipeline_mask,
        }
        .filter_cadences(quality_bitmask);
        log::info!(
            "... {} cadences of {}x{} pixels ({} discarded)",
            tpf.len(),
            tpf.pipeline_mask.shape.0,
            tpf.pipeline_mask.shape.1,
            cadences - tpf.len()
        );
        Ok(tpf)
    }
    /// Keeps the cadences with a finite time and no quality flag in `bitmask`
    fn filter_cadences(self, bitmask: i32) -> Self {
        let n_pixel = self.pipeline_mask.len();
        let keep: Vec<bool> = self
            .time
            .iter()
            .zip(&self.quality)
            .map(|(t, q)| t.is_finite() && q & bitmask == 0)
            .collect();
        let pick = |x: &[f64], width: usize| -> Vec<f64> {
            x.chunks(width.max(1))
                .zip(&keep)
                .filter(|(_, k)| **k)
                .flat_map(|(c, _)| c.iter().cloned())
                .collect()
        };
        Self {
            time: pick(&self.time, 1),
            flux: pick(&self.flux, n_pixel),
            flux_err: pick(&self.flux_err, n_pixel),
            quality: self
                .quality
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(q, _)| *q)
                .collect(),
            ..self
        }
    }
    /// Number of cadences
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn time(&self) -> &[f64] {
        &self.time
    }
    pub fn quality(&self) -> &[i32] {
        &self.quality
    }
    /// Pixel fluxes of cadence `k`
    pub fn cadence_flux(&self, k: usize) -> Option<&[f64]> {
        let n = self.pipeline_mask.len();
        self.flux.get(k * n..(k + 1) * n)
    }
    /// The aperture the mission pipeline used for the photometry
    pub fn pipeline_mask(&self) -> &Aperture {
        &self.pipeline_mask
    }
    pub fn metadata(&self) -> Metadata {
        let time_range = self.time.first().zip(self.time.last()).and_then(|(t0, t1)| {
            time::bkjd_to_iso(*t0).zip(time::bkjd_to_iso(*t1))
        });
        Metadata {
            mission: self.mission.clone(),
            quarter: self.quarter,
            campaign: self.campaign,
            time_range,
        }
    }
    /// Simple aperture photometry: sums the pixel fluxes inside the aperture
    ///
    /// Non finite pixel values are skipped, a cadence without any finite pixel has a NaN flux.
    pub fn to_lightcurve(&self, aperture: &Aperture) -> Result<LightCurve> {
        let n_pixel = self.pipeline_mask.len();
        if aperture.len() != n_pixel {
            return Err(TpfError::Aperture {
                flux: n_pixel,
                aperture: aperture.len(),
            });
        }
        if aperture.pixel_count() == 0 {
            return Err(TpfError::EmptyAperture);
        }
        let sum = |values: &[f64], square: bool| -> f64 {
            let (n, s) = values
                .iter()
                .zip(aperture.mask())
                .filter(|(v, m)| **m && v.is_finite())
                .fold((0usize, 0f64), |(n, s), (v, _)| {
                    (n + 1, s + if square { v * v } else { *v })
                });
            if n == 0 {
                f64::NAN
            } else {
                s
            }
        };
        let (flux, flux_err): (Vec<f64>, Vec<f64>) = self
            .flux
            .chunks(n_pixel)
            .zip(self.flux_err.chunks(n_pixel))
            .map(|(f, e)| (sum(f, false), sum(e, true).sqrt()))
            .unzip();
        Ok(LightCurve::new(self.time.clone(), flux, flux_err)?)
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use fitsio::{
        images::{ImageDescription, ImageType},
        tables::{ColumnDataType, ColumnDescription},
        FitsFile,
    };

    use crate::time::BKJD_REFERENCE;

    /// Synthetic K2 target pixel file
    pub struct Fixture {
        pub shape: (usize, usize),
        pub time: Vec<f64>,
        /// cadence major pixel fluxes
        pub flux: Vec<f64>,
        pub quality: Vec<i32>,
        pub aperture: Vec<i32>,
    }
    impl Fixture {
        /// 2x2 pixels, the pipeline aperture being the top row, with a 2.5 day flux modulation
        pub fn sinusoid(n: usize) -> Self {
            let time: Vec<f64> = (0..n)
                .map(|i| 2457140. - BKJD_REFERENCE + i as f64 * 0.0204)
                .collect();
            let flux = time
                .iter()
                .flat_map(|t| {
                    let s = 1. + 0.01 * (2. * std::f64::consts::PI * t / 2.5).sin();
                    [600. * s, 400. * s, 10., 10.]
                })
                .collect();
            Self {
                shape: (2, 2),
                time,
                flux,
                quality: vec![0; n],
                aperture: vec![3, 3, 1, 1],
            }
        }
        pub fn write<P: AsRef<std::path::Path>>(&self, path: P) -> fitsio::errors::Result<()> {
            let n_pixel = self.shape.0 * self.shape.1;
            let mut fits = FitsFile::create(path.as_ref()).overwrite().open()?;
            let primary = fits.primary_hdu()?;
            primary.write_key(&mut fits, "TELESCOP", "Kepler")?;
            primary.write_key(&mut fits, "MISSION", "K2")?;
            primary.write_key(&mut fits, "OBJECT", "EPIC 211414081")?;
            primary.write_key(&mut fits, "CAMPAIGN", 5i64)?;

            let columns = [
                ColumnDescription::new("TIME")
                    .with_type(ColumnDataType::Double)
                    .create()?,
                ColumnDescription::new("FLUX")
                    .with_type(ColumnDataType::Double)
                    .that_repeats(n_pixel)
                    .create()?,
                ColumnDescription::new("FLUX_ERR")
                    .with_type(ColumnDataType::Double)
                    .that_repeats(n_pixel)
                    .create()?,
                ColumnDescription::new("QUALITY")
                    .with_type(ColumnDataType::Int)
                    .create()?,
            ];
            let table = fits.create_table("TARGETTABLES", &columns)?;
            table.write_col(&mut fits, "TIME", &self.time)?;
            table.write_col(&mut fits, "QUALITY", &self.quality)?;
            let flux_err: Vec<f64> = self.flux.iter().map(|f| f.abs().sqrt()).collect();
            table.write_col(&mut fits, "FLUX", &self.flux)?;
            table.write_col(&mut fits, "FLUX_ERR", &flux_err)?;

            let description = ImageDescription {
                data_type: ImageType::Long,
                dimensions: &[self.shape.0, self.shape.1],
            };
            let aperture = fits.create_image("APERTURE", &description)?;
            aperture.write_image(&mut fits, &self.aperture)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fixture::Fixture, *};

    #[test]
    fn read_fixture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("211414081.fits");
        let mut fixture = Fixture::sinusoid(100);
        fixture.quality[10] = 32;
        fixture.quality[11] = 16;
        fixture.time[12] = f64::NAN;
        fixture.write(&path).unwrap();

        let tpf = TargetPixelFile::open(&path).unwrap();
        assert_eq!(tpf.mission, "K2");
        assert_eq!(tpf.campaign, Some(5));
        assert_eq!(tpf.quarter, None);
        assert_eq!(tpf.object.as_deref(), Some("EPIC 211414081"));
        // 32 (reaction wheel desaturation) is in the default bitmask, 16 is not
        assert_eq!(tpf.len(), 98);
        assert_eq!(tpf.quality()[10], 16);
        assert_eq!(tpf.pipeline_mask().shape(), (2, 2));
        assert_eq!(tpf.pipeline_mask().mask(), &[true, true, false, false]);
        assert_eq!(tpf.cadence_flux(0).unwrap(), &fixture.flux[..4]);

        let everything = TargetPixelFile::open_with_bitmask(&path, 0).unwrap();
        assert_eq!(everything.len(), 99);
    }

    #[test]
    fn vector_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpf.fits");
        let fixture = Fixture::sinusoid(20);
        fixture.write(&path).unwrap();
        let tpf = TargetPixelFile::open(&path).unwrap();
        for k in 0..20 {
            assert_eq!(tpf.cadence_flux(k).unwrap(), &fixture.flux[4 * k..4 * (k + 1)]);
        }
        assert!(tpf.cadence_flux(20).is_none());
    }

    #[test]
    fn mismatched_flux_err() {
        use fitsio::tables::{ColumnDataType, ColumnDescription};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpf.fits");
        {
            let mut fits = FitsFile::create(&path).open().unwrap();
            let columns = [
                ColumnDescription::new("TIME")
                    .with_type(ColumnDataType::Double)
                    .create()
                    .unwrap(),
                ColumnDescription::new("FLUX")
                    .with_type(ColumnDataType::Double)
                    .that_repeats(4)
                    .create()
                    .unwrap(),
                ColumnDescription::new("FLUX_ERR")
                    .with_type(ColumnDataType::Double)
                    .that_repeats(2)
                    .create()
                    .unwrap(),
                ColumnDescription::new("QUALITY")
                    .with_type(ColumnDataType::Int)
                    .create()
                    .unwrap(),
            ];
            let table = fits.create_table("TARGETTABLES", &columns).unwrap();
            table.write_col(&mut fits, "TIME", &[1., 2., 3.]).unwrap();
            table.write_col(&mut fits, "QUALITY", &[0, 0, 0]).unwrap();
            table.write_col(&mut fits, "FLUX", &[1f64; 12]).unwrap();
            table.write_col(&mut fits, "FLUX_ERR", &[1f64; 6]).unwrap();
        }
        assert!(matches!(
            TargetPixelFile::open(&path),
            Err(TpfError::ColumnLength { column, values: 6, cadences: 3 }) if column == "FLUX_ERR"
        ));
    }

    #[test]
    fn lightcurve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpf.fits");
        let fixture = Fixture::sinusoid(50);
        fixture.write(&path).unwrap();
        let tpf = TargetPixelFile::open(&path).unwrap();

        let lc = tpf.to_lightcurve(tpf.pipeline_mask()).unwrap();
        assert_eq!(lc.len(), 50);
        assert_eq!(lc.time(), &fixture.time[..]);
        for (k, f) in lc.flux().iter().enumerate() {
            let expected = fixture.flux[4 * k] + fixture.flux[4 * k + 1];
            assert!((f - expected).abs() < 1e-9);
        }
        let e = lc.flux_err()[0];
        assert!((e - (fixture.flux[0] + fixture.flux[1]).sqrt()).abs() < 1e-9);

        let all = tpf.to_lightcurve(&Aperture::all((2, 2))).unwrap();
        assert!((all.flux()[0] - lc.flux()[0] - 20.).abs() < 1e-9);

        assert!(matches!(
            tpf.to_lightcurve(&Aperture::new((2, 2), vec![false; 4])),
            Err(TpfError::EmptyAperture)
        ));
        assert!(matches!(
            tpf.to_lightcurve(&Aperture::all((3, 3))),
            Err(TpfError::Aperture { .. })
        ));
    }

    #[test]
    fn metadata_report() {
        let metadata = Metadata {
            mission: "K2".into(),
            quarter: None,
            campaign: Some(5),
            time_range: Some((
                "2015-04-27 11:58:52.816".into(),
                "2015-07-10 00:11:23.000".into(),
            )),
        };
        let mut buffer = Vec::new();
        metadata.report(&mut buffer).unwrap();
        let report = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Mission:  K2",
                "Quarter:  None (campaign 5)",
                "Time:  2015-04-27 11:58:52.816 .. 2015-07-10 00:11:23.000"
            ]
        );
        let kepler = Metadata {
            mission: "Kepler".into(),
            quarter: Some(7),
            campaign: None,
            time_range: None,
        };
        assert_eq!(kepler.to_string(), "Mission:  Kepler\nQuarter:  7\nTime:  None\n");
    }

    #[test]
    fn fixture_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tpf.fits");
        Fixture::sinusoid(10).write(&path).unwrap();
        let metadata = TargetPixelFile::open(&path).unwrap().metadata();
        let (start, _) = metadata.time_range.unwrap();
        assert_eq!(start, "2015-04-27 11:58:52.816");
    }
}
