//! Target pixel data to diagnostic plots
//!
//! The stages run in sequence, each one receiving the products of the previous ones:
//!  1. acquisition of the target pixel data from an [Archive]
//!  2. persistence of the data into `<epic>.fits`
//!  3. metadata report
//!  4. light curve, periodogram and plots
//!
//! A target without pixel data ends the run at stage 1 with [Error::NotFound].

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
};

use crate::{
    persist, Archive, EpicId, Error, Figure, Invocation, LightCurve, Periodogram, PixelData,
    PlotSink, TargetPixelFile, USAGE,
};

type Result<T> = std::result::Result<T, Error>;

/// Outliers beyond that many standard deviations are removed from the plotted light curve
pub const OUTLIER_SIGMA: f64 = 5.;
/// Periodogram frequency grid oversampling
pub const OVERSAMPLE_FACTOR: f64 = 1.;

/// Outcome of a run
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub epic: EpicId,
    /// absolute path of the saved target pixel file
    pub fits_path: PathBuf,
    /// period of maximum power [day]
    pub best_period: f64,
}

/// Downloads the target pixel data, [Error::NotFound] if the archive has none
pub fn acquire<A: Archive>(archive: &A, epic: EpicId) -> Result<PixelData> {
    archive.fetch(epic)?.ok_or(Error::NotFound(epic))
}

/// Saves the target pixel data into `<dir>/<epic>.fits`
pub fn save<P: AsRef<Path>>(data: &PixelData, dir: P) -> Result<PathBuf> {
    Ok(persist::save_fits(data, dir)?)
}

/// Simple aperture photometry with the pipeline aperture
pub fn lightcurve(tpf: &TargetPixelFile) -> Result<LightCurve> {
    Ok(tpf.to_lightcurve(tpf.pipeline_mask())?)
}

pub fn periodogram(lc: &LightCurve) -> Result<Periodogram> {
    Ok(lc.to_periodogram(OVERSAMPLE_FACTOR)?)
}

/// The sequence of stages from an EPIC id to the plots
pub struct Pipeline<A, S, W = io::Stdout> {
    archive: A,
    sink: S,
    out: W,
    fits_dir: PathBuf,
}
impl<A: Archive, S: PlotSink> Pipeline<A, S> {
    pub fn new<P: AsRef<Path>>(archive: A, sink: S, fits_dir: P) -> Self {
        Self {
            archive,
            sink,
            out: io::stdout(),
            fits_dir: fits_dir.as_ref().to_path_buf(),
        }
    }
}
impl<A, S, W> Pipeline<A, S, W> {
    /// Redirects the status messages
    pub fn writer<V: Write>(self, out: V) -> Pipeline<A, S, V> {
        let Self {
            archive,
            sink,
            fits_dir,
            ..
        } = self;
        Pipeline {
            archive,
            sink,
            out,
            fits_dir,
        }
    }
    pub fn archive(&self) -> &A {
        &self.archive
    }
    pub fn sink(&self) -> &S {
        &self.sink
    }
    pub fn out(&self) -> &W {
        &self.out
    }
}
impl<A: Archive, S: PlotSink, W: Write> Pipeline<A, S, W> {
    /// Prints the usage or runs the pipeline, according to the command line
    pub fn execute(&mut self, invocation: Invocation) -> Result<Option<Summary>> {
        match invocation {
            Invocation::Usage => {
                writeln!(self.out, "{USAGE}")?;
                Ok(None)
            }
            Invocation::Run(epic) => self.run(epic).map(Some),
        }
    }
    pub fn run(&mut self, epic: EpicId) -> Result<Summary> {
        writeln!(self.out, "Going to download pixel data for  {epic}")?;
        let data = match acquire(&self.archive, epic) {
            Ok(data) => data,
            Err(Error::NotFound(epic)) => {
                writeln!(self.out, "Unable to download TPF for  {epic}")?;
                writeln!(self.out, "Exiting..")?;
                return Err(Error::NotFound(epic));
            }
            Err(e) => return Err(e),
        };

        let fits_path = save(&data, &self.fits_dir)?;
        writeln!(self.out, "Saved FITS file at:  {}", fits_path.display())?;

        let tpf = TargetPixelFile::open(&fits_path)?;
        writeln!(self.out, "Info on pixel data")?;
        tpf.metadata().report(&mut self.out)?;

        let lc = lightcurve(&tpf)?;
        let normalized = lc.remove_outliers(OUTLIER_SIGMA).normalize()?;
        self.sink
            .show(&Figure::normalized_lightcurve(epic, &normalized))?;

        let pg = periodogram(&lc)?;
        self.sink.show(&Figure::amplitude_vs_frequency(epic, &pg))?;
        self.sink.show(&Figure::amplitude_vs_period(epic, &pg))?;

        let best_period = pg.period_at_max_power();
        writeln!(self.out, "Best period: {best_period:?} d")?;
        let folded = lc.fold(best_period)?;
        self.sink.show(&Figure::folded_flux(epic, &folded))?;

        Ok(Summary {
            epic,
            fits_path,
            best_period,
        })
    }
}
