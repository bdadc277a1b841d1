use std::io;

use crate::{
    ArchiveError, ConfigError, EpicId, EpicIdError, LightCurveError, PeriodogramError,
    PersistError, PlotError, TpfError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed EPIC id")]
    EpicId(#[from] EpicIdError),
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("no target pixel data found for EPIC {0}")]
    NotFound(EpicId),
    #[error("failed to acquire the target pixel data")]
    Archive(#[from] ArchiveError),
    #[error("failed to save the target pixel data")]
    Persist(#[from] PersistError),
    #[error("failed to load the target pixel file")]
    Tpf(#[from] TpfError),
    #[error("failed to process the light curve")]
    LightCurve(#[from] LightCurveError),
    #[error("failed to compute the periodogram")]
    Periodogram(#[from] PeriodogramError),
    #[error("failed to show the plots")]
    Plot(#[from] PlotError),
    #[error("failed to write to the output")]
    Output(#[from] io::Error),
}
