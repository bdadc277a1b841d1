use std::{fmt, num::ParseIntError, str::FromStr};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EpicIdError {
    #[error("empty EPIC id")]
    Empty,
    #[error("EPIC id must be made of ASCII digits only, found {0:?}")]
    NotDigits(String),
    #[error("EPIC id {0:?} is out of range")]
    Range(String, #[source] ParseIntError),
}

/// K2 Ecliptic Plane Input Catalog identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpicId(u64);
impl EpicId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn value(&self) -> u64 {
        self.0
    }
    /// Name of the FITS file the target pixel data is saved to
    pub fn fits_filename(&self) -> String {
        format!("{}.fits", self.0)
    }
    /// Archive sub-directories of the target:
    /// `(epic / 10^5) * 10^5` and `(epic % 10^5 / 10^3) * 10^3`
    pub fn archive_dirs(&self) -> (String, String) {
        let upper = self.0 / 100_000 * 100_000;
        let lower = self.0 % 100_000 / 1_000 * 1_000;
        (format!("{upper}"), format!("{lower:05}"))
    }
}
impl From<u64> for EpicId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
impl FromStr for EpicId {
    type Err = EpicIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EpicIdError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(EpicIdError::NotDigits(s.to_string()));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| EpicIdError::Range(s.to_string(), e))
    }
}
impl fmt::Display for EpicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
