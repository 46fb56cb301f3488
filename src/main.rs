use radar_mosaic::render::types::SolidBasemap;
use radar_mosaic::{cli::Cli, config::AppConfig, logging, RegionRenderer};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();

    let mut app_config = AppConfig::load(cli.config.clone())?;
    if cli.verbose {
        app_config.log_filter = "debug".to_string();
    }
    logging::init(&app_config.log_filter);

    cli.apply_overrides(&mut app_config.render);

    let output_path = cli.output_path(app_config.output.clone())?;

    tracing::info!(region = ?cli.region, "starting render");

    let renderer = RegionRenderer::new(SolidBasemap::default());
    let canvas = renderer.render(&cli.region, cli.width, cli.height, &app_config.render)?;

    let bytes = radar_mosaic::ImageFormat::Png.encode(&canvas)?;
    std::fs::write(&output_path, bytes)?;

    tracing::info!(path = %output_path.display(), "wrote output");
    Ok(())
}
