//! Diagnostic plots
//!
//! A [Figure] is the data and the decoration of a plot, a [PlotSink] shows it.
//! [PngViewer] renders the figures as PNG files and, optionally, opens each of
//! them with an external viewer, waiting for the viewer to be closed.

use std::{
    fmt, io,
    path::{Path, PathBuf},
    process::{Command, ExitStatus},
};

use plotters::prelude::*;

use crate::{EpicId, FoldedLightCurve, LightCurve, Periodogram};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("failed to draw {0:?}: {1}")]
    Draw(String, String),
    #[error("{0:?} has no finite data to plot")]
    NoData(String),
    #[error("failed to launch viewer {0:?}")]
    Viewer(String, #[source] io::Error),
    #[error("viewer {0:?} exited with {1}")]
    ViewerStatus(String, ExitStatus),
}
type Result<T> = std::result::Result<T, PlotError>;

/// The diagnostic plots, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureKind {
    /// outliers free normalized flux vs time
    LightCurve,
    /// periodogram amplitude vs frequency
    AmplitudeVsFrequency,
    /// periodogram amplitude vs period, log scaled period
    AmplitudeVsPeriod,
    /// flux folded at the period of maximum power
    FoldedFlux,
}
impl fmt::Display for FigureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigureKind::LightCurve => write!(f, "lightcurve"),
            FigureKind::AmplitudeVsFrequency => write!(f, "periodogram_frequency"),
            FigureKind::AmplitudeVsPeriod => write!(f, "periodogram_period"),
            FigureKind::FoldedFlux => write!(f, "folded"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Line,
    Scatter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub epic: EpicId,
    pub kind: FigureKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_log: bool,
    pub style: Style,
    pub points: Vec<(f64, f64)>,
}
impl Figure {
    pub fn normalized_lightcurve(epic: EpicId, lc: &LightCurve) -> Self {
        Self {
            epic,
            kind: FigureKind::LightCurve,
            title: format!("Light Curve of {epic}"),
            x_label: String::from("Time - 2454833 [BKJD days]"),
            y_label: String::from("Normalized Flux"),
            x_log: false,
            style: Style::Line,
            points: lc.time().iter().cloned().zip(lc.flux().iter().cloned()).collect(),
        }
    }
    pub fn amplitude_vs_frequency(epic: EpicId, pg: &Periodogram) -> Self {
        Self {
            epic,
            kind: FigureKind::AmplitudeVsFrequency,
            title: format!("Amplitude vs Freq: Periodogram of {epic}"),
            x_label: String::from("Frequency [1/d]"),
            y_label: String::from("Amplitude"),
            x_log: false,
            style: Style::Line,
            points: pg
                .frequency()
                .iter()
                .cloned()
                .zip(pg.amplitude().iter().cloned())
                .collect(),
        }
    }
    pub fn amplitude_vs_period(epic: EpicId, pg: &Periodogram) -> Self {
        let mut points: Vec<(f64, f64)> = pg
            .period()
            .iter()
            .cloned()
            .zip(pg.amplitude().iter().cloned())
            .collect();
        points.reverse();
        Self {
            epic,
            kind: FigureKind::AmplitudeVsPeriod,
            title: format!("Amplitude vs Period: Periodogram of {epic}"),
            x_label: String::from("Period [d]"),
            y_label: String::from("Amplitude"),
            x_log: true,
            style: Style::Line,
            points,
        }
    }
    pub fn folded_flux(epic: EpicId, folded: &FoldedLightCurve) -> Self {
        Self {
            epic,
            kind: FigureKind::FoldedFlux,
            title: format!("Max Power (Flux) of {epic}"),
            x_label: format!("Phase (period: {:.5} d)", folded.period),
            y_label: String::from("Flux [e-/s]"),
            x_log: false,
            style: Style::Scatter,
            points: folded
                .phase
                .iter()
                .cloned()
                .zip(folded.flux.iter().cloned())
                .collect(),
        }
    }
    /// `<epic>_<kind>.png`
    pub fn file_name(&self) -> String {
        format!("{}_{}.png", self.epic, self.kind)
    }
    /// Finite points, and positive abscissa on a log axis
    fn finite_points(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .cloned()
            .filter(|(x, y)| x.is_finite() && y.is_finite() && (!self.x_log || *x > 0f64))
            .collect()
    }
    /// Renders the figure into a PNG file
    pub fn render<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let points = self.finite_points();
        if points.is_empty() {
            return Err(PlotError::NoData(self.title.clone()));
        }
        let bounds = |values: Vec<f64>, log: bool| -> (f64, f64) {
            let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if log {
                if max > min {
                    (min, max)
                } else {
                    (min * 0.5, max * 2.)
                }
            } else {
                let pad = if max > min {
                    (max - min) * 5e-2
                } else {
                    min.abs().max(1f64) * 1e-2
                };
                (min - pad, max + pad)
            }
        };
        let (x_min, x_max) = bounds(points.iter().map(|p| p.0).collect(), self.x_log);
        let (y_min, y_max) = bounds(points.iter().map(|p| p.1).collect(), false);

        let draw_err =
            |e: &dyn std::error::Error| PlotError::Draw(self.title.clone(), e.to_string());
        let color = colorous::TABLEAU10[0];
        let rgb = RGBColor(color.r, color.g, color.b);

        let plot = BitMapBackend::new(path.as_ref(), (768, 512)).into_drawing_area();
        plot.fill(&WHITE).map_err(|e| draw_err(&e))?;
        let mut builder = ChartBuilder::on(&plot);
        builder
            .caption(&self.title, ("sans-serif", 20))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .margin(10);

        macro_rules! draw {
            ($chart:expr) => {{
                let mut chart = $chart;
                chart
                    .configure_mesh()
                    .x_desc(&self.x_label)
                    .y_desc(&self.y_label)
                    .draw()
                    .map_err(|e| draw_err(&e))?;
                match self.style {
                    Style::Line => chart
                        .draw_series(LineSeries::new(points.iter().cloned(), &rgb))
                        .map(|_| ()),
                    Style::Scatter => chart
                        .draw_series(
                            points
                                .iter()
                                .map(|&point| Circle::new(point, 2, rgb.filled())),
                        )
                        .map(|_| ()),
                }
                .map_err(|e| draw_err(&e))?;
            }};
        }
        if self.x_log {
            draw!(builder
                .build_cartesian_2d((x_min..x_max).log_scale(), y_min..y_max)
                .map_err(|e| draw_err(&e))?);
        } else {
            draw!(builder
                .build_cartesian_2d(x_min..x_max, y_min..y_max)
                .map_err(|e| draw_err(&e))?);
        }
        plot.present().map_err(|e| draw_err(&e))?;
        Ok(())
    }
}

/// Figure display
pub trait PlotSink {
    /// Shows the figure, returning once the figure has been dismissed
    fn show(&mut self, figure: &Figure) -> Result<()>;
}
impl<T: PlotSink + ?Sized> PlotSink for &mut T {
    fn show(&mut self, figure: &Figure) -> Result<()> {
        (**self).show(figure)
    }
}

/// Writes the figures as PNG files and opens them with a viewer
pub struct PngViewer {
    dir: PathBuf,
    viewer: Option<String>,
    shown: Vec<PathBuf>,
}
impl PngViewer {
    pub fn new<P: AsRef<Path>>(dir: P, viewer: Option<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            viewer,
            shown: vec![],
        }
    }
    /// Path of the files written so far
    pub fn files(&self) -> &[PathBuf] {
        &self.shown
    }
    fn open(&self, viewer: &str, path: &Path) -> Result<()> {
        let mut words = viewer.split_whitespace();
        let Some(program) = words.next() else {
            return Ok(());
        };
        log::info!("Opening {:?} with {}", path, program);
        let status = Command::new(program)
            .args(words)
            .arg(path)
            .status()
            .map_err(|e| PlotError::Viewer(viewer.to_string(), e))?;
        if status.success() {
            Ok(())
        } else {
            Err(PlotError::ViewerStatus(viewer.to_string(), status))
        }
    }
}
impl PlotSink for PngViewer {
    fn show(&mut self, figure: &Figure) -> Result<()> {
        let path = self.dir.join(figure.file_name());
        figure.render(&path)?;
        log::info!("{} written to {:?}", figure.title, path);
        if let Some(viewer) = &self.viewer {
            self.open(viewer, &path)?;
        }
        self.shown.push(path);
        Ok(())
    }
}
