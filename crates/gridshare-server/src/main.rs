//! gridshare server entry point.
//!
//! Loads the persisted settings, builds a [`SwitchEngine`] for this machine's
//! screen and runs it under a [`ServiceHost`], so the same lifecycle that an
//! OS service manager drives (pause, continue, stop) is exercised when the
//! server runs in the foreground.  Ctrl+C is translated into a stop request.
//!
//! # Usage
//!
//! ```text
//! gridshare-server [OPTIONS] [COMMAND]
//!
//! Commands:
//!   run           Run the server (default)
//!   print-config  Print the server config text for the stored settings
//!   check-config  Parse a config text file and report errors
//!
//! Options:
//!   --settings <FILE>     Settings file [default: platform config dir]
//!   --name <NAME>         Screen name of this machine
//!   --log-level <LEVEL>   Log level when RUST_LOG is unset [default: info]
//!   --auto-add <DIR>      Place unknown clients next to the server
//!   --screen-size <WxH>   Shape of the headless screen [default: 1920x1080]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                | Flag          |
//! |-------------------------|---------------|
//! | `GRIDSHARE_SETTINGS`    | `--settings`  |
//! | `GRIDSHARE_SCREEN_NAME` | `--name`      |
//! | `GRIDSHARE_LOG_LEVEL`   | `--log-level` |
//!
//! # Architecture overview
//!
//! ```text
//! main()
//!  ├─ load_settings()           -- TOML settings, defaults on first run
//!  ├─ ServiceHost::run_daemon   (blocking thread)
//!  │    └─ EventLoop::run       -- SwitchEngine on HeadlessScreen + LogRouting
//!  └─ ctrl_c()                  -- ServiceControl::Stop
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::runtime::Handle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gridshare_core::{parse_config, Direction, Rect};
use gridshare_server::application::event_loop::EventLoop;
use gridshare_server::application::route_input::{RoutingLayer, SwitchEngine};
use gridshare_server::infrastructure::platform::headless::HeadlessScreen;
use gridshare_server::infrastructure::platform::PlatformScreen;
use gridshare_server::infrastructure::routing::LogRouting;
use gridshare_server::infrastructure::service::{
    clear_global, install_global, ServiceControl, ServiceHost,
};
use gridshare_server::infrastructure::storage::settings::{
    load_settings, settings_file_path, Settings,
};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// gridshare server.
///
/// Shares this machine's keyboard and mouse with the client screens arranged
/// around it in the configured grid.
#[derive(Debug, Parser)]
#[command(
    name = "gridshare-server",
    about = "Keyboard and mouse sharing across a grid of screens",
    version
)]
struct Cli {
    /// Settings file to load instead of the platform default.
    #[arg(long, global = true, env = "GRIDSHARE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Screen name of this machine; overrides the stored name.
    #[arg(long, global = true, env = "GRIDSHARE_SCREEN_NAME")]
    name: Option<String>,

    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, global = true, default_value = "info", env = "GRIDSHARE_LOG_LEVEL")]
    log_level: String,

    /// Admit clients missing from the layout, placing them next to the
    /// server in this direction (left, right, up, down).
    #[arg(long, global = true, value_parser = parse_direction)]
    auto_add: Option<Direction>,

    /// Shape of the headless server screen, as `WIDTHxHEIGHT`.
    #[arg(long, global = true, default_value = "1920x1080", value_parser = parse_screen_size)]
    screen_size: Rect,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the server until Ctrl+C.
    Run,
    /// Print the server config text for the stored settings.
    PrintConfig,
    /// Parse a config text file and report the first error.
    CheckConfig {
        /// Config text file.
        file: PathBuf,
    },
}

fn parse_direction(text: &str) -> Result<Direction, String> {
    Direction::from_name(&text.to_ascii_lowercase())
        .ok_or_else(|| format!("expected left, right, up or down, got {text:?}"))
}

fn parse_screen_size(text: &str) -> Result<Rect, String> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {text:?}"))?;
    let width: u32 = w.trim().parse().map_err(|e| format!("bad width {w:?}: {e}"))?;
    let height: u32 = h.trim().parse().map_err(|e| format!("bad height {h:?}: {e}"))?;
    if width == 0 || height == 0 {
        return Err("screen size must be non-zero".to_string());
    }
    Ok(Rect::new(0, 0, width, height))
}

impl Cli {
    fn settings_path(&self) -> anyhow::Result<PathBuf> {
        match &self.settings {
            Some(path) => Ok(path.clone()),
            None => settings_file_path().context("locating the settings file"),
        }
    }

    fn load_settings(&self) -> anyhow::Result<Settings> {
        let path = self.settings_path()?;
        let mut settings = load_settings(&path)
            .with_context(|| format!("loading settings from {}", path.display()))?;
        if let Some(name) = &self.name {
            settings.screen_name = name.clone();
        }
        Ok(settings)
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// One run of the engine under the service host.  Returns the exit code
/// reported to the host.
fn run_engine(
    host: &ServiceHost,
    runtime: &Handle,
    settings: &Settings,
    auto_add: Option<Direction>,
    platform: &Arc<HeadlessScreen>,
    routing: &Arc<LogRouting>,
) -> i32 {
    let engine = SwitchEngine::new(
        settings.config.clone(),
        &settings.screen_name,
        Arc::clone(platform) as Arc<dyn PlatformScreen>,
        Arc::clone(routing) as Arc<dyn RoutingLayer>,
    );
    let mut engine = match engine {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "cannot create the switch engine");
            return 1;
        }
    };
    engine.set_auto_add(auto_add);

    let (mut event_loop, queue) = EventLoop::new(engine);
    host.attach_queue(queue);
    host.set_running();
    match runtime.block_on(event_loop.run()) {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "event loop failed to start");
            1
        }
    }
}

async fn run_server(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.load_settings()?;
    info!(
        screen = %settings.screen_name,
        screens = settings.config.topology.num_screens(),
        hotkeys = settings.config.hotkeys.len(),
        "gridshare server starting"
    );

    let platform = Arc::new(HeadlessScreen::new(cli.screen_size));
    let routing = Arc::new(LogRouting::new());
    let host = ServiceHost::new();
    install_global(&host);

    let mut daemon = {
        let host = host.clone();
        let runtime = Handle::current();
        let auto_add = cli.auto_add;
        let routing = Arc::clone(&routing);
        tokio::task::spawn_blocking(move || {
            host.run_daemon(|host| {
                run_engine(host, &runtime, &settings, auto_add, &platform, &routing)
            })
        })
    };

    let code = tokio::select! {
        joined = &mut daemon => joined.context("daemon thread panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            info!("shutdown signal received");
            let stopper = host.clone();
            tokio::task::spawn_blocking(move || stopper.control(ServiceControl::Stop))
                .await
                .context("stop request failed")?;
            daemon.await.context("daemon thread panicked")?
        }
    };
    clear_global();

    let stats = routing.stats();
    info!(
        switches = stats.switches,
        forwarded = stats.forwarded,
        clipboard = stats.clipboard_messages,
        "gridshare server stopped"
    );
    if code != 0 {
        anyhow::bail!("engine exited with code {code}");
    }
    Ok(())
}

fn print_config(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.load_settings()?;
    print!("{}", settings.config);
    Ok(())
}

fn check_config(file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let config = parse_config(&text).with_context(|| format!("invalid config {}", file.display()))?;
    println!(
        "{}: ok ({} screens, {} hotkeys)",
        file.display(),
        config.topology.num_screens(),
        config.hotkeys.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `RUST_LOG` wins over `--log-level` when both are set.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => run_server(&cli).await,
        Command::PrintConfig => print_config(&cli),
        Command::CheckConfig { file } => check_config(&file),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_run_with_info_logging() {
        // Arrange / Act
        let cli = Cli::parse_from(["gridshare-server"]);

        // Assert
        assert_eq!(cli.command, None);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.auto_add, None);
        assert_eq!(cli.screen_size, Rect::new(0, 0, 1920, 1080));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "gridshare-server",
            "run",
            "--name",
            "desk",
            "--auto-add",
            "Right",
        ]);

        assert_eq!(cli.command, Some(Command::Run));
        assert_eq!(cli.name.as_deref(), Some("desk"));
        assert_eq!(cli.auto_add, Some(Direction::Right));
    }

    #[test]
    fn test_cli_check_config_takes_a_file() {
        let cli = Cli::parse_from(["gridshare-server", "check-config", "office.conf"]);

        assert_eq!(
            cli.command,
            Some(Command::CheckConfig {
                file: PathBuf::from("office.conf")
            })
        );
    }

    #[test]
    fn test_cli_rejects_unknown_direction() {
        let result = Cli::try_parse_from(["gridshare-server", "--auto-add", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_screen_size_parsing() {
        assert_eq!(parse_screen_size("2560x1440"), Ok(Rect::new(0, 0, 2560, 1440)));
        assert!(parse_screen_size("0x1080").is_err());
        assert!(parse_screen_size("wide").is_err());
    }

    #[test]
    fn test_explicit_settings_path_is_used() {
        let cli = Cli::parse_from(["gridshare-server", "--settings", "/tmp/gs.toml"]);
        assert_eq!(cli.settings_path().unwrap(), PathBuf::from("/tmp/gs.toml"));
    }
}
