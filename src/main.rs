mod config;
mod logging;
mod mapping;
mod matching;
mod ports;
mod services;
mod somafm;
mod spotify_rs;
#[cfg(test)]
mod test_utils;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use tokio::sync::watch;

use crate::{
    config::Config,
    logging::{init_tracing, shutdown_tracing},
    ports::clock::{Clock, TokioClock},
    services::{
        scheduler::Scheduler, spotify::client::SpotifyCatalogAdapter, sync::SyncService,
    },
    somafm::SomaFmSource,
    spotify_rs::auth::{exchange_code_for_token, initiate_oauth},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "SOMAFY_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "info" or "somafy=debug"
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// OTLP gRPC endpoint to export spans to
    #[arg(long, global = true, env = "OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(flatten)]
    spotify: SpotifyArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug, Clone)]
struct SpotifyArgs {
    /// Spotify app client id
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
    spotify_client_id: Option<String>,

    /// Spotify app client secret
    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    spotify_client_secret: Option<String>,

    /// Spotify refresh token, see the `authorize` command
    #[arg(long, global = true, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    spotify_refresh_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync all channels, then keep syncing with a random pause in between
    Run,
    /// Run a single sync cycle and exit
    Once,
    /// Obtain a Spotify refresh token
    Authorize {
        /// The `code` query parameter Spotify redirected to. Without it, the
        /// authorization URL is printed.
        #[arg(long)]
        code: Option<String>,

        /// Redirect URI registered for the Spotify app
        #[arg(long, default_value = "http://localhost:9090")]
        redirect_uri: String,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider =
        init_tracing("somafy", args.otlp_endpoint.as_deref(), &args.log_level)?;

    let result = run(args).await;
    shutdown_tracing(tracer_provider);
    result
}

async fn run(args: Args) -> Result<()> {
    tracing::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .wrap_err("Failed to load somafy config")?;

    match args.command {
        Commands::Run => {
            let clock: Arc<dyn Clock> = Arc::new(TokioClock);
            let sync = sync_service(&config, args.spotify, clock.clone())?;
            let scheduler = Scheduler::new(
                sync,
                clock,
                config.min_sleep_minutes,
                config.max_sleep_minutes,
            );

            let (shutdown_sender, shutdown) = watch::channel(false);
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        tracing::info!("Shutdown requested, finishing current cycle");
                        shutdown_sender.send_replace(true);
                    }
                    Err(error) => {
                        tracing::error!(error = %error, "Failed to listen for ctrl-c");
                        // Keep the sender alive so the scheduler keeps running.
                        std::future::pending::<()>().await;
                    }
                }
            });

            tracing::info!(channels = ?config.channels, "Starting sync loop");
            scheduler.run(shutdown).await;
        }
        Commands::Once => {
            let sync = sync_service(&config, args.spotify, Arc::new(TokioClock))?;
            let report = sync.run_cycle().await?;
            report.log();
        }
        Commands::Authorize { code, redirect_uri } => {
            let (client_id, client_secret) = config.spotify_app(
                args.spotify.spotify_client_id,
                args.spotify.spotify_client_secret,
            )?;
            match code {
                None => {
                    let auth = initiate_oauth(&client_id, &redirect_uri);
                    println!("Open this URL and grant access:\n\n{}\n", auth.auth_url);
                    println!(
                        "Then run `somafy authorize --code <code>` with the `code` parameter \
                         of the page you are redirected to (state: {}).",
                        auth.state
                    );
                }
                Some(code) => {
                    let token =
                        exchange_code_for_token(&client_id, &client_secret, &code, &redirect_uri)
                            .await
                            .wrap_err("Failed to exchange authorization code")?;
                    match token.refresh_token {
                        Some(refresh_token) => {
                            println!("SPOTIFY_REFRESH_TOKEN={refresh_token}");
                        }
                        None => {
                            return Err(eyre!("Spotify returned no refresh token"));
                        }
                    }
                }
            }
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                tracing::debug!("Creating default config");
                let path = Config::create_default()?;
                tracing::info!(path = %path.display(), "Default config ready");
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

fn sync_service(
    config: &Config,
    spotify: SpotifyArgs,
    clock: Arc<dyn Clock>,
) -> Result<SyncService<SpotifyCatalogAdapter, SomaFmSource>> {
    let credentials = config.spotify_credentials(
        spotify.spotify_client_id,
        spotify.spotify_client_secret,
        spotify.spotify_refresh_token,
    )?;
    let catalog = SpotifyCatalogAdapter::new(credentials, config.playlist_public);
    tracing::debug!(
        mapping = %config.mapping_path().display(),
        "Using match cache",
    );
    Ok(SyncService::new(
        catalog,
        SomaFmSource::new(),
        clock,
        config.sync_settings(),
    ))
}
