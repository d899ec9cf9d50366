mod assess_commands;
mod auth_commands;
mod request_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    edulift_client::{ApiClient, SessionEvent},
    tokio::sync::broadcast,
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "edulift", about = "EduLift command-line client", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/edulift/).
    #[arg(long, global = true, env = "EDULIFT_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Directory holding the session file (overrides the platform data dir).
    #[arg(long, global = true, env = "EDULIFT_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Backend base URL, including the `/api` prefix (overrides config value).
    #[arg(long, global = true, env = "EDULIFT_API_URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Session management: login, logout, status.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Send an arbitrary authenticated request and print the JSON reply.
    Request(request_commands::RequestArgs),
    /// Career guidance, talent identification and test results.
    Assess {
        #[command(subcommand)]
        action: assess_commands::AssessAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load config (file, then env, then flags) and build the client on top of
/// the persisted session file.
fn build_client(cli: &Cli) -> anyhow::Result<ApiClient> {
    if let Some(ref dir) = cli.config_dir {
        edulift_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        edulift_config::set_data_dir(dir.clone());
    }

    let mut config = edulift_config::discover_and_load();
    if let Some(ref url) = cli.api_url {
        config.api.base_url = url.clone();
    }

    debug!(
        base_url = %config.api.base_url,
        session = %config.session.resolve_path().display(),
        "client configuration"
    );
    Ok(ApiClient::from_config(&config)?)
}

/// The data layer only announces an eviction; telling the user to log in
/// again is up to the shell.
fn report_session_events(rx: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::Expired { reason } => {
                eprintln!("Your session has ended ({reason}).");
                eprintln!("Run `edulift auth login` to sign in again.");
            },
            SessionEvent::Refreshed => debug!("access token refreshed"),
            SessionEvent::LoggedIn { .. } | SessionEvent::LoggedOut => {},
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "edulift starting");

    let client = build_client(&cli)?;
    let mut events = client.subscribe();

    let result = match cli.command {
        Commands::Auth { action } => auth_commands::handle_auth(&client, action).await,
        Commands::Request(args) => request_commands::handle_request(&client, args).await,
        Commands::Assess { action } => assess_commands::handle_assess(&client, action).await,
    };

    report_session_events(&mut events);
    result
}
