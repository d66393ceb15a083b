mod canvas;

use std::{
    io::{BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, anyhow};
use clap::{Parser, ValueEnum};
use dds_core::mk_static;
use dds_core::utils::connection::stream::{DecodeError, decode_command, encode_snapshot};
use dds_core::utils::controllers::{
    CommandChannel, CommandLatch, Robot, RobotSnapshot, SimController, SnapshotSlot,
};
use dds_core::utils::math::kinematics::{RobotConfig, WheelCommand};
use dds_core::utils::render::run_renderer;
use dds_core::utils::{Duration, Instant, SimSettings, Timer};
use embassy_executor::{Executor, Spawner};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};
use static_cell::StaticCell;
use tracing::{error, info, warn};

use crate::canvas::{AsciiCanvas, LogCanvas, TermCanvas};

type RawMutex = CriticalSectionRawMutex;

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CanvasKind {
    /// Character grid in the terminal
    Ascii,
    /// Shapes reported through the log
    Log,
    /// No rendering
    #[value(name = "none")]
    Off,
}

#[derive(Parser)]
#[clap(version = "1.0", about = "Differential drive robot simulator")]
struct Opts {
    /// JSON settings file; flags below override it
    #[clap(long)]
    config: Option<PathBuf>,
    /// distance between wheel contact points (inches)
    #[clap(long)]
    track_width: Option<f64>,
    /// wheel speed limit (inches/sec)
    #[clap(long)]
    max_speed: Option<f64>,
    /// initial x position (inches)
    #[clap(long, allow_hyphen_values = true)]
    x: Option<f64>,
    /// initial y position (inches)
    #[clap(long, allow_hyphen_values = true)]
    y: Option<f64>,
    /// initial heading (radians, 0 faces +y)
    #[clap(long, allow_hyphen_values = true)]
    heading: Option<f64>,
    /// initial left wheel speed (inches/sec)
    #[clap(long, allow_hyphen_values = true)]
    left: Option<f64>,
    /// initial right wheel speed (inches/sec)
    #[clap(long, allow_hyphen_values = true)]
    right: Option<f64>,
    /// pause between integrator ticks (ms)
    #[clap(long)]
    tick_ms: Option<u64>,
    /// pause between rendered frames (ms)
    #[clap(long)]
    frame_ms: Option<u64>,
    /// stop after this many seconds
    #[clap(long)]
    duration: Option<f64>,
    /// where to draw the robot
    #[clap(long, value_enum, default_value = "ascii")]
    canvas: CanvasKind,
    /// grid width for the ascii canvas
    #[clap(long, default_value_t = 72)]
    cols: usize,
    /// grid height for the ascii canvas
    #[clap(long, default_value_t = 36)]
    rows: usize,
    /// print one JSON snapshot per frame to stdout
    #[clap(long)]
    telemetry: bool,
    /// read JSON drive commands from stdin, one per line
    #[clap(long)]
    stdin_commands: bool,
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static COMMANDS: CommandChannel<RawMutex> = Channel::new();

#[embassy_executor::task]
async fn integrator_task(
    mut ctrl: SimController<'static, RawMutex>,
    deadline: Option<Instant>,
) {
    let code = match ctrl.run(deadline).await {
        Ok(_) => 0,
        Err(e) => {
            error!("simulation stopped: {}", e);
            1
        }
    };
    std::process::exit(code);
}

#[embassy_executor::task]
async fn command_task(commands: &'static CommandLatch<RawMutex>) -> ! {
    SimController::command_ch(commands, &COMMANDS).await
}

#[embassy_executor::task]
async fn render_task(
    mut canvas: TermCanvas,
    snapshots: &'static SnapshotSlot<RawMutex>,
    config: RobotConfig,
    frame_interval: Duration,
) {
    if let Err(e) = run_renderer(&mut canvas, snapshots, config, frame_interval).await {
        error!("canvas failed, rendering stopped: {:?}", e);
    }
}

#[embassy_executor::task]
async fn telemetry_task(
    snapshots: &'static SnapshotSlot<RawMutex>,
    interval: Duration,
) {
    let mut out = std::io::stdout();
    loop {
        match encode_snapshot(&snapshots.latest()) {
            Ok(line) => {
                if writeln!(out, "{line}").is_err() {
                    warn!("stdout closed, telemetry stopped");
                    return;
                }
            }
            Err(e) => error!("error serializing snapshot: {:?}", e),
        }
        Timer::after(interval).await;
    }
}

/// Read JSON command lines on a plain thread and queue them for `command_task`.
fn spawn_stdin_reader() {
    std::thread::spawn(|| {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match decode_command(&line) {
                Ok(cmd) => {
                    if COMMANDS.try_send(cmd).is_err() {
                        warn!("command queue full, dropping {:?}", cmd);
                    }
                }
                Err(DecodeError::Empty) => {}
                Err(e) => warn!("ignoring command line {:?}: {}", line, e),
            }
        }
        info!("stdin closed, no more commands");
    });
}

fn load_settings(opts: &Opts) -> anyhow::Result<SimSettings> {
    let mut settings = match &opts.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings from {}", path.display()))?;
            serde_json::from_str::<SimSettings>(&text)
                .with_context(|| format!("parsing settings in {}", path.display()))?
        }
        // Same demo the simulator has always started with: veer right.
        None => SimSettings {
            initial: WheelCommand::new(10.0, -2.0),
            ..SimSettings::default()
        },
    };

    if let Some(v) = opts.track_width {
        settings.track_width = v;
    }
    if let Some(v) = opts.max_speed {
        settings.max_speed = v;
    }
    if let Some(v) = opts.x {
        settings.start.x = v;
    }
    if let Some(v) = opts.y {
        settings.start.y = v;
    }
    if let Some(v) = opts.heading {
        settings.start.heading = v;
    }
    if let Some(v) = opts.left {
        settings.initial.left = v;
    }
    if let Some(v) = opts.right {
        settings.initial.right = v;
    }
    if let Some(v) = opts.tick_ms {
        settings.tick_ms = v;
    }
    if let Some(v) = opts.frame_ms {
        settings.frame_ms = v;
    }
    Ok(settings)
}

/// Instant `secs` seconds after `now`, rejecting negative or unrepresentable spans.
fn deadline_after(
    now: Instant,
    secs: f64,
) -> anyhow::Result<Instant> {
    if !(secs.is_finite() && secs >= 0.0) {
        return Err(anyhow!("--duration must be a non-negative number of seconds"));
    }
    let micros = secs * 1_000_000.0;
    if micros >= u64::MAX as f64 {
        return Err(anyhow!("--duration {secs} is too long"));
    }
    now.checked_add(Duration::from_micros(micros as u64))
        .ok_or_else(|| anyhow!("--duration {secs} is too long"))
}

fn spawn_or_log<S>(
    spawner: &Spawner,
    name: &str,
    token: embassy_executor::SpawnToken<S>,
) {
    if let Err(e) = spawner.spawn(token) {
        error!("failed to spawn {}: {:?}", name, e);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts: Opts = Opts::parse();
    let settings = load_settings(&opts)?;
    let config = settings
        .robot_config()
        .map_err(|e| anyhow!("invalid robot configuration: {e}"))?;
    let viewport = settings
        .viewport()
        .map_err(|e| anyhow!("invalid settings: {e}"))?;
    if opts.telemetry && opts.canvas == CanvasKind::Ascii {
        warn!("telemetry and the ascii canvas share stdout; consider --canvas log");
    }

    let commands: &'static CommandLatch<RawMutex> =
        mk_static!(CommandLatch<RawMutex>, CommandLatch::new(config));
    commands.set_speed(settings.initial.left, settings.initial.right);
    let snapshots: &'static SnapshotSlot<RawMutex> = mk_static!(
        SnapshotSlot<RawMutex>,
        SnapshotSlot::new(RobotSnapshot::default())
    );

    let now = Instant::now();
    let robot = Robot::new(commands, settings.start, now);
    let ctrl = SimController::new(robot, snapshots, Some(settings.tick_interval()));
    let deadline = opts
        .duration
        .map(|secs| deadline_after(now, secs))
        .transpose()?;

    let canvas = match opts.canvas {
        CanvasKind::Ascii => Some(TermCanvas::Ascii(AsciiCanvas::new(
            viewport,
            opts.cols.max(1),
            opts.rows.max(1),
        ))),
        CanvasKind::Log => Some(TermCanvas::Log(LogCanvas::default())),
        CanvasKind::Off => None,
    };

    if opts.stdin_commands {
        spawn_stdin_reader();
    }

    info!(
        left = commands.current().left,
        right = commands.current().right,
        "starting simulation"
    );

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawn_or_log(&spawner, "integrator", integrator_task(ctrl, deadline));
        spawn_or_log(&spawner, "commands", command_task(commands));
        if let Some(canvas) = canvas {
            spawn_or_log(
                &spawner,
                "renderer",
                render_task(canvas, snapshots, config, settings.frame_interval()),
            );
        }
        if opts.telemetry {
            spawn_or_log(
                &spawner,
                "telemetry",
                telemetry_task(snapshots, settings.frame_interval()),
            );
        }
    })
}
