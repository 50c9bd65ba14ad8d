use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ytmp3::cli::{Cli, Commands, LogFormat};
use ytmp3::{
    extract_video_id, output, utils, Config, ConversionController, ConversionError,
    ConversionState, RapidApiClient,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet, cli.log_format);

    match cli.command {
        Commands::Convert {
            url,
            format,
            output: output_path,
            save,
        } => {
            let config = Config::load().await?.with_api_key(cli.api_key);
            let client = RapidApiClient::new(&config.api, config.api_key()?)?;
            let controller =
                ConversionController::spawn(Arc::new(client), config.poll_settings());

            let state = convert_with_spinner(&controller, &url, cli.quiet).await?;
            output::print_to_console(&state, &format)?;

            let converted = match state {
                ConversionState::Succeeded(converted) => converted,
                _ => return Ok(ExitCode::FAILURE),
            };

            let target = match (output_path, save) {
                (Some(path), _) => Some(path),
                (None, true) => Some(config.download_dir()?.join(utils::mp3_file_name(&converted))),
                (None, false) => None,
            };

            if let Some(path) = target {
                output::download_mp3(&converted, &path, cli.quiet).await?;
                println!("MP3 saved to: {}", path.display());
            }
        }
        Commands::Id { url } => match extract_video_id(&url) {
            Some(video_id) => println!("{}", video_id),
            None => {
                eprintln!("{}", ConversionError::Validation);
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Thumbnail { url } => match extract_video_id(&url) {
            Some(video_id) => {
                let thumbs = video_id.thumbnails();
                println!("{}", thumbs.primary);
                println!("{}", thumbs.fallback);
            }
            None => {
                eprintln!("{}", ConversionError::Validation);
                return Ok(ExitCode::FAILURE);
            }
        },
        Commands::Config { show } => {
            let config = Config::load().await?.with_api_key(cli.api_key);
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it manually or run `ytmp3 config --show` to see current values.");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool, quiet: bool, format: LogFormat) {
    let default_filter = if verbose {
        "ytmp3=debug"
    } else if quiet {
        "ytmp3=warn"
    } else {
        "ytmp3=info"
    };

    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| default_filter.into()),
    );

    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Run one conversion while a spinner mirrors the controller's progress message
async fn convert_with_spinner(
    controller: &ConversionController,
    url: &str,
    quiet: bool,
) -> Result<ConversionState> {
    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_message("Converting...");
    progress.enable_steady_tick(Duration::from_millis(120));

    let mut updates = controller.subscribe();
    let watcher = {
        let progress = progress.clone();
        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let message = updates.borrow_and_update().state.progress().to_string();
                if !message.is_empty() {
                    progress.set_message(message);
                }
            }
        })
    };

    let state = controller.convert(url).await;

    watcher.abort();
    progress.finish_and_clear();

    state
}
