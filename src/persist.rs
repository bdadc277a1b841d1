use std::{
    fs, io,
    path::{Path, PathBuf},
};

use crate::PixelData;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to write {0:?}")]
    Write(PathBuf, #[source] io::Error),
    #[error("failed to resolve the absolute path of {0:?}")]
    Canonicalize(PathBuf, #[source] io::Error),
}

/// Writes the pixel data to `<dir>/<epic>.fits`, replacing any previous file
///
/// Returns the absolute path of the file
pub fn save_fits<P: AsRef<Path>>(data: &PixelData, dir: P) -> Result<PathBuf, PersistError> {
    let path = dir.as_ref().join(data.epic.fits_filename());
    fs::write(&path, &data.bytes).map_err(|e| PersistError::Write(path.clone(), e))?;
    log::info!("{} bytes written to {:?}", data.len(), path);
    path.canonicalize()
        .map_err(|e| PersistError::Canonicalize(path, e))
}
