//! K2 simple aperture photometry explorer
//!
//! Downloads the target pixel file of an EPIC target from MAST, saves it to
//! `<epic>.fits`, derives the light curve with the pipeline aperture, computes
//! its Lomb-Scargle periodogram and shows the diagnostic plots.
//!
//! ```no_run
//! use sap_lightcurve::{Config, EpicId, MastArchive, Pipeline, PngViewer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let archive = MastArchive::from_config(&config)?;
//! let viewer = PngViewer::new(&config.plot_dir, config.viewer.clone());
//! let summary = Pipeline::new(archive, viewer, config.fits_dir()?).run(EpicId::new(211414081))?;
//! println!("{:?}", summary.best_period);
//! # Ok(())
//! # }
//! ```

pub mod archive;
mod cli;
mod config;
mod epic;
mod error;
pub mod lightcurve;
pub mod periodogram;
pub mod persist;
pub mod pipeline;
pub mod plot;
pub mod time;
pub mod tpf;

pub use archive::{Archive, ArchiveError, MastArchive, PixelData};
pub use cli::{Invocation, Opt, USAGE};
pub use config::{Config, ConfigError};
pub use epic::{EpicId, EpicIdError};
pub use error::Error;
pub use lightcurve::{FoldedLightCurve, LightCurve, LightCurveError};
pub use periodogram::{Periodogram, PeriodogramError};
pub use persist::PersistError;
pub use pipeline::{Pipeline, Summary};
pub use plot::{Figure, FigureKind, PlotError, PlotSink, PngViewer};
pub use tpf::{Aperture, Metadata, TargetPixelFile, TpfError};
