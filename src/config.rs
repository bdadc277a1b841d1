use std::{
    env::{self, VarError},
    path::PathBuf,
    time::Duration,
};

pub const MAST_URL: &str = "https://archive.stsci.edu";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} env var is not valid unicode")]
    Unicode(String),
    #[error("{0} env var is set to an invalid value: {1:?}")]
    Invalid(String, String),
    #[error("failed to resolve the current directory")]
    CurrentDir(#[source] std::io::Error),
}
type Result<T> = std::result::Result<T, ConfigError>;

/// Run-time settings
///
/// Settings are read from the environment:
///  - `MAST_URL`: archive base URL
///  - `SAP_PLOT_DIR`: directory the plots are written to
///  - `SAP_VIEWER`: command a plot file is opened with, the pipeline waits for it to exit
///  - `SAP_HTTP_TIMEOUT`: HTTP timeout in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mast_url: String,
    pub plot_dir: PathBuf,
    pub viewer: Option<String>,
    pub http_timeout: Option<Duration>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            mast_url: MAST_URL.to_string(),
            plot_dir: PathBuf::from("."),
            viewer: None,
            http_timeout: None,
        }
    }
}
impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key))
    }
    /// Builds the settings from a key/value lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> std::result::Result<String, VarError>,
    {
        let var = |key: &str| -> Result<Option<String>> {
            match lookup(key) {
                Ok(value) if value.trim().is_empty() => Ok(None),
                Ok(value) => Ok(Some(value.trim().to_string())),
                Err(VarError::NotPresent) => Ok(None),
                Err(VarError::NotUnicode(_)) => Err(ConfigError::Unicode(key.to_string())),
            }
        };
        let mut config = Self::default();
        if let Some(url) = var("MAST_URL")? {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid("MAST_URL".into(), url));
            }
            config.mast_url = url;
        }
        if let Some(dir) = var("SAP_PLOT_DIR")? {
            config.plot_dir = PathBuf::from(dir);
        }
        config.viewer = var("SAP_VIEWER")?;
        if let Some(timeout) = var("SAP_HTTP_TIMEOUT")? {
            let seconds = timeout
                .parse::<f64>()
                .ok()
                .filter(|s| s.is_finite() && *s > 0f64)
                .ok_or_else(|| ConfigError::Invalid("SAP_HTTP_TIMEOUT".into(), timeout.clone()))?;
            config.http_timeout = Some(Duration::from_secs_f64(seconds));
        }
        Ok(config)
    }
    /// Directory the FITS file is saved to: the process working directory
    pub fn fits_dir(&self) -> Result<PathBuf> {
        env::current_dir().map_err(ConfigError::CurrentDir)
    }
}
