use argh::FromArgs;
use pneumo::{
    Backend, LocalPredictor, PneumoConfig, RemoteClient, SvgRenderer, XrayImage,
    config::DEFAULT_CONFIG_PATH, predict_and_render, server,
};
use std::{path::PathBuf, sync::Arc};

#[cfg(feature = "onnx")]
type LocalModel = pneumo::local::onnx::OnnxClassifier;
#[cfg(not(feature = "onnx"))]
type LocalModel = pneumo::local::UnavailableClassifier;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8501;

#[derive(FromArgs)]
/// Respiratory disease prediction from chest X-rays
struct PneumoArgs {
    /// path to the TOML config file
    #[argh(option, short = 'c', default = "PathBuf::from(DEFAULT_CONFIG_PATH)")]
    config: PathBuf,

    /// prediction backend: "remote" or "local"
    #[argh(option, short = 'b', default = "String::from(\"remote\")")]
    backend: String,

    #[argh(subcommand)]
    command: PneumoCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum PneumoCommands {
    Predict(PredictCommand),
    Serve(ServeCommand),
}

#[derive(FromArgs)]
/// Predict a single image and write the chart
#[argh(subcommand, name = "predict")]
struct PredictCommand {
    /// the path to the image (jpg, jpeg or png)
    #[argh(option, short = 'i')]
    image_path: PathBuf,

    /// where to write the SVG chart
    #[argh(option, short = 'o', default = "PathBuf::from(\"prediction.svg\")")]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Serve the upload page
#[argh(subcommand, name = "serve")]
struct ServeCommand {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

fn build_backend(
    name: &str,
    config: &PneumoConfig,
) -> Result<Backend<LocalModel>, Box<dyn std::error::Error>> {
    match name {
        "remote" => {
            let client = RemoteClient::new(config.base_url()?, config.request_timeout())?;
            log::debug!("Using remote backend at {}", client.endpoint());
            Ok(Backend::Remote(client))
        }
        "local" => {
            let mut predictor = LocalPredictor::new(config.model_artifact());
            if let Some(path) = &config.results_file {
                predictor = predictor.with_results_file(path);
            }
            // load up front so a missing artifact stops startup
            predictor.cache().get_or_load()?;
            Ok(Backend::local(predictor))
        }
        other => Err(format!("Unknown backend: {other}").into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: PneumoArgs = argh::from_env();

    let config = PneumoConfig::from_env(&args.config)?;
    let backend = build_backend(&args.backend, &config)?;

    match args.command {
        PneumoCommands::Predict(cmd) => {
            let image = XrayImage::open(&cmd.image_path)?;
            let mut renderer = SvgRenderer::with_output(&cmd.output);

            match predict_and_render(&backend, &image, &mut renderer).await {
                Ok(cycle) => {
                    println!("{}", serde_json::to_string_pretty(&cycle.prediction)?);
                }
                Err(e) => {
                    log::error!("{e}");
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        PneumoCommands::Serve(cmd) => {
            let addr = format!("{}:{}", cmd.host, cmd.port);
            server::serve(&addr, Arc::new(server::AppState::new(backend))).await?;
        }
    }

    Ok(())
}
