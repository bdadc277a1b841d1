use std::ffi::OsString;

use structopt::StructOpt;

use crate::{EpicId, EpicIdError};

pub const USAGE: &str = "Usage: sap-lightcurve <epicID_of_target>";

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sap-lightcurve",
    about = "Plots the light curve and the periodogram of a K2 target"
)]
pub struct Opt {
    /// EPIC id of the target, e.g. 211414081
    epic: Option<String>,
}

/// What the command line asks for
#[derive(Debug, PartialEq)]
pub enum Invocation {
    /// no target was given
    Usage,
    Run(EpicId),
}
impl Invocation {
    pub fn from_args() -> Result<Self, EpicIdError> {
        Self::try_from(Opt::from_args())
    }
    pub fn from_iter<I>(args: I) -> Result<Self, EpicIdError>
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        Self::try_from(Opt::from_iter(args))
    }
}
impl TryFrom<Opt> for Invocation {
    type Error = EpicIdError;

    fn try_from(opt: Opt) -> Result<Self, Self::Error> {
        match opt.epic {
            None => Ok(Invocation::Usage),
            Some(arg) => Ok(Invocation::Run(arg.parse()?)),
        }
    }
}
