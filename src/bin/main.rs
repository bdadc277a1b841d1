use sap_lightcurve::{Config, Invocation, MastArchive, Pipeline, PngViewer};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let invocation = Invocation::from_args()?;
    let config = Config::from_env()?;
    log::debug!("{config:?}");
    let archive = MastArchive::from_config(&config)?;
    let viewer = PngViewer::new(&config.plot_dir, config.viewer.clone());
    let mut pipeline = Pipeline::new(archive, viewer, config.fits_dir()?);
    if let Some(summary) = pipeline.execute(invocation)? {
        log::info!("{summary:?}");
    }

    Ok(())
}
