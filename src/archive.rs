//! Target pixel data acquisition
//!
//! An [Archive] looks up the target pixel file of an EPIC target and downloads it.
//! A successful lookup that matches no product is `Ok(None)`, so callers can tell
//! "no data for this target" apart from transport or format failures.

use crate::EpicId;

mod mast;
pub use mast::MastArchive;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to build the HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to {0} failed")]
    Request(String, #[source] reqwest::Error),
    #[error("{url} answered with HTTP status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to parse the archive search results")]
    Search(#[from] serde_json::Error),
    #[error("failed to decompress {0}")]
    Decompress(String, #[source] std::io::Error),
    #[error("archive search row has no campaign: {0}")]
    Campaign(String),
}

/// Raw target pixel data, as delivered by the archive
#[derive(Debug, Clone)]
pub struct PixelData {
    /// the target the data belongs to
    pub epic: EpicId,
    /// the archive dataset name, e.g. `ktwo211414081-c05`
    pub dataset: String,
    /// the FITS file content
    pub bytes: Vec<u8>,
}
impl PixelData {
    pub fn new(epic: EpicId, dataset: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            epic,
            dataset: dataset.into(),
            bytes,
        }
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Data archive interface
pub trait Archive {
    /// Searches the archive for `epic` and downloads the default match
    fn fetch(&self, epic: EpicId) -> Result<Option<PixelData>, ArchiveError>;
}
impl<T: Archive + ?Sized> Archive for &T {
    fn fetch(&self, epic: EpicId) -> Result<Option<PixelData>, ArchiveError> {
        (**self).fetch(epic)
    }
}
impl<T: Archive + ?Sized> Archive for Box<T> {
    fn fetch(&self, epic: EpicId) -> Result<Option<PixelData>, ArchiveError> {
        (**self).fetch(epic)
    }
}
