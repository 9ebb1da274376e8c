use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use doa_visualiser_core::{
    connection::websocket, scene::Primitive, BackendParam, ClientConfig, ConnectionManager,
    Control, DisplayChange, LaunchParameters, PacingStatus, RenderHooks, RenderMode, Scene,
    Session, VisError,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing_subscriber::EnvFilter;

fn main() -> doa_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Live {
            url,
            query,
            preset,
            mode,
            no_autostart,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            let result = runtime.block_on(run_live(
                url,
                &query,
                preset.as_deref(),
                mode,
                !no_autostart,
            ));
            // The stdin reader may still be parked on a blocking read.
            runtime.shutdown_background();
            result
        }
        Commands::Inspect { query, preset } => run_inspect(&query, preset.as_deref()),
    }
}

async fn run_live(
    url: Option<String>,
    query: &str,
    preset: Option<&Path>,
    mode: Option<RenderMode>,
    autostart: bool,
) -> doa_visualiser_core::Result<()> {
    let launch = LaunchParameters::from_query(query);
    let mut config = load_config(preset)?;
    if let Some(mode) = mode {
        config.mode = mode;
    }

    let url = url
        .or_else(|| launch.default_url())
        .ok_or_else(|| VisError::msg("no --url given and ws_port is not usable"))?;
    tracing::info!(%url, mode = %config.mode, "starting live mode");

    let link = websocket::connect(&url).await?;
    let session = Session::open(&launch, &config, Box::new(TerminalRenderer));
    let mut manager = ConnectionManager::open(link, session)?;
    if autostart {
        manager.start()?;
    }

    let (controls, control_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(controls));
    let session = manager.run(control_rx).await?;
    tracing::info!(
        frames = session.frames_drawn(),
        degraded = session.pacer().is_degraded(),
        "session ended; display holds last state"
    );
    Ok(())
}

/// Forwards commands typed on stdin to the connection loop. End of input
/// leaves the loop running until the backend goes away.
async fn read_commands(controls: mpsc::UnboundedSender<Control>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(%err, "failed to read stdin; commands disabled");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(control) => {
                let close = control == Control::Close;
                if controls.send(control).is_err() || close {
                    break;
                }
            }
            Err(err) => tracing::warn!(command = line.trim(), "{err}"),
        }
    }
}

/// Parses one `verb [argument]` line, e.g. `lines 10` or `mode tiled`.
fn parse_command(line: &str) -> Result<Control, String> {
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let arg = words.next();
    if words.next().is_some() {
        return Err(format!("too many arguments for `{verb}`"));
    }

    let control = match (verb, arg) {
        ("start", None) => Control::Start,
        ("stop", None) => Control::Stop,
        ("quit" | "close", None) => Control::Close,
        ("lines", Some(arg)) => Control::SetNumLines(
            arg.parse::<usize>()
                .map_err(|_| format!("`{arg}` is not a line count"))?,
        ),
        ("duration", Some(arg)) => Control::SetDuration(number(arg)?),
        ("interval", Some(arg)) => Control::SetInterval(number(arg)?),
        ("mode", Some(arg)) => {
            Control::SetMode(arg.parse::<RenderMode>().map_err(|err| err.to_string())?)
        }
        ("ratelimit", Some(arg)) => Control::SetRateLimiting(switch(arg)?),
        ("beamformer", Some(arg)) => Control::SendParam(BackendParam::Beamformer(switch(arg)?)),
        ("wndlen", Some(arg)) => Control::SendParam(BackendParam::PoolingWndlen(arg.into())),
        ("alpha", Some(arg)) => Control::SendParam(BackendParam::PoolingAlpha(arg.into())),
        ("pooltype", Some(arg)) => Control::SendParam(BackendParam::PoolingType(arg.into())),
        ("ymax", Some(arg)) => Control::SetDisplay(DisplayChange::YMax(number(arg)?)),
        ("xoffset", Some(arg)) => Control::SetDisplay(DisplayChange::XOffset(number(arg)?)),
        ("yoffset", Some(arg)) => Control::SetDisplay(DisplayChange::YOffset(number(arg)?)),
        ("anglewidth", Some(arg)) => {
            Control::SetDisplay(DisplayChange::AngleWidth(number(arg)?))
        }
        ("flip", Some(arg)) => Control::SetDisplay(DisplayChange::FlipVideo(switch(arg)?)),
        _ => return Err(format!("unknown command `{}`", line.trim())),
    };
    Ok(control)
}

fn number(arg: &str) -> Result<f64, String> {
    arg.parse().map_err(|_| format!("`{arg}` is not a number"))
}

fn switch(arg: &str) -> Result<bool, String> {
    match arg {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(format!("expected on or off, got `{arg}`")),
    }
}

fn run_inspect(query: &str, preset: Option<&Path>) -> doa_visualiser_core::Result<()> {
    let launch = LaunchParameters::from_query(query);
    let config = load_config(preset)?;
    let interval = if config.mode.is_windowed() {
        config.duration / config.num_lines.max(1) as f64
    } else {
        config.interval
    };
    let summary = serde_json::json!({
        "launch": launch,
        "bins": launch.bins(),
        "config": config,
        "interval_ms": interval,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn load_config(preset: Option<&Path>) -> doa_visualiser_core::Result<ClientConfig> {
    match preset {
        Some(path) => {
            tracing::debug!(?path, "loading preset");
            ClientConfig::from_json_file(path)
        }
        None => Ok(ClientConfig::default()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Stands in for the chart library: logs a one-line digest of each redraw.
struct TerminalRenderer;

impl RenderHooks for TerminalRenderer {
    fn on_frame(&mut self, scene: &Scene) {
        let newest = scene
            .primitives
            .iter()
            .filter(|primitive| match primitive {
                Primitive::Polyline(line) => line.age == 0,
                Primitive::Arc(arc) => arc.age == 0,
                Primitive::Tile(tile) => tile.age == 0,
            })
            .count();
        tracing::info!(
            mode = %scene.mode,
            primitives = scene.len(),
            newest,
            peak = scene.peak(),
            "redraw"
        );
    }

    fn on_resize(&mut self, num_lines: usize) {
        tracing::info!(num_lines, "window resized");
    }

    fn on_mode_switch(&mut self, from: RenderMode, to: RenderMode) {
        tracing::info!(%from, %to, "mode switched");
    }

    fn on_status(&mut self, status: PacingStatus) {
        match status {
            PacingStatus::Ok => tracing::info!("rate limit status: ok"),
            PacingStatus::Degraded { .. } => {
                tracing::warn!("rate limit status: {}", status.message())
            }
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Live direction-of-arrival visualiser client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the backend and render pool vectors as they arrive.
    Live {
        /// Websocket endpoint; defaults to the local host on `ws_port`.
        #[arg(short, long)]
        url: Option<String>,
        /// Launch parameters as a query string, e.g.
        /// `min_angle=-90&max_angle=90&model_length=37&ws_port=8090`.
        #[arg(short, long, default_value = "")]
        query: String,
        /// Optional JSON preset with the initial client settings.
        #[arg(short, long)]
        preset: Option<PathBuf>,
        /// Render mode to start in, overriding the preset.
        #[arg(short, long)]
        mode: Option<RenderMode>,
        /// Open the connection without starting the pull loop.
        #[arg(long)]
        no_autostart: bool,
    },
    /// Print the resolved launch parameters and client settings.
    Inspect {
        #[arg(short, long, default_value = "")]
        query: String,
        #[arg(short, long)]
        preset: Option<PathBuf>,
    },
}
