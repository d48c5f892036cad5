//! slackbadge - Slack unread/mention badge daemon
//!
//! Keeps a badge with the team's unread and mention counts up to date from
//! periodic snapshots and the realtime stream.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use unread::{
    HttpIconLoader, NotifierService, RefreshSchedule, Settings, SettingsTokenSource, SlackClient,
    StreamManager, WebSocketConnector, open_team,
};

mod host;

use host::DesktopHost;

/// How often the settings file is checked for a new token
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "slackbadge", version, about = "Slack unread badge")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the notifier (default)
    Run,
    /// Store the API token in settings.json
    SetToken { token: String },
    /// Show whether a token is configured
    ShowToken,
    /// Focus or open the team's web client
    Open,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(),
        Command::SetToken { token } => set_token(&token),
        Command::ShowToken => show_token(),
        Command::Open => open_in_browser(),
    }
}

fn set_token(token: &str) -> Result<()> {
    let mut settings = match Settings::default_settings_path() {
        Some(path) if path.exists() => Settings::from_file(&path)?,
        _ => Settings::default(),
    };
    settings.token = token.trim().to_string();
    settings.save().context("Failed to save settings")?;

    if let Some(path) = Settings::default_settings_path() {
        info!("Saved token to {}", path.display());
    }
    Ok(())
}

fn show_token() -> Result<()> {
    let settings = Settings::load()?;
    match settings.token() {
        Some(token) => println!("{}", mask(token)),
        None => println!("No token configured"),
    }
    Ok(())
}

/// Keep the token prefix (`xoxp-`) and the last four characters
fn mask(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 9 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 9), tail)
}

fn build_service(settings: &Settings, host: Arc<DesktopHost>) -> Arc<NotifierService> {
    let client = SlackClient::with_base_url(&settings.api_base_url);
    Arc::new(
        NotifierService::new(
            Arc::new(client),
            Box::new(SettingsTokenSource),
            Arc::new(HttpIconLoader::new()),
            host.clone(),
            host,
        )
        .with_stream_connect_method(settings.stream_connect_method.clone()),
    )
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

fn open_in_browser() -> Result<()> {
    let settings = Settings::load()?;
    let host = Arc::new(DesktopHost::new());
    let service = build_service(&settings, host.clone());

    let outcome = runtime()?.block_on(open_team(&service, host.as_ref()))?;
    info!("{:?}", outcome);
    Ok(())
}

fn run() -> Result<()> {
    let settings = Settings::load()?;
    if settings.token().is_none()
        && let Some(path) = Settings::default_settings_path()
    {
        warn!(
            "No API token configured. Run `slackbadge set-token <TOKEN>`, \
             set SLACK_TOKEN, or edit {}",
            path.display()
        );
    }

    let host = Arc::new(DesktopHost::new());
    let service = build_service(&settings, host);
    let schedule = RefreshSchedule::every(settings.refresh_interval_secs);

    runtime()?.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut manager = StreamManager::new(service.clone(), Arc::new(WebSocketConnector::new()));
        let stream = tokio::spawn(async move { manager.run(shutdown_rx).await });

        let refresher = tokio::spawn(refresh_loop(service.clone(), schedule));
        let watcher = tokio::spawn(watch_settings(service.clone()));

        info!("Running; press Ctrl-C to stop");
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }

        info!("Shutting down");
        refresher.abort();
        watcher.abort();
        shutdown_tx.send_replace(true);
        if let Err(e) = stream.await {
            warn!("Stream task ended abnormally: {}", e);
        }
    });

    Ok(())
}

/// Snapshot on startup, then on every schedule tick outside the cooldown
async fn refresh_loop(service: Arc<NotifierService>, schedule: RefreshSchedule) {
    let mut ticker = tokio::time::interval(schedule.interval);
    loop {
        ticker.tick().await;
        if schedule.is_due(service.last_snapshot_at()) {
            service.refresh().await;
        }
    }
}

/// Pick up token edits made outside the process
async fn watch_settings(service: Arc<NotifierService>) {
    let mut last = Settings::load()
        .ok()
        .and_then(|s| s.token().map(str::to_string));
    let mut ticker = tokio::time::interval(SETTINGS_POLL_INTERVAL);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let token = match Settings::load() {
            Ok(settings) => settings.token().map(str::to_string),
            Err(e) => {
                warn!("Failed to reload settings: {:#}", e);
                continue;
            }
        };
        if token != last {
            last = token.clone();
            service.on_credential_change(token).await;
        }
    }
}
