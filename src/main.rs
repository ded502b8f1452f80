use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{
    io::{self, BufRead},
    path::PathBuf,
    sync::Arc,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use serial_automation::{
    list_ports, DryRunOpener, LinkOpener, ScaleConfig, SceneSource, SessionConfig, SharedScene,
    StreamingSession, Transform,
};

#[derive(Parser)]
#[command(
    name = "serial-automation",
    version,
    about = "Stream an object transform to a motor controller"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports
    Ports {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Stream transforms read from stdin
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Serial port, e.g. /dev/ttyACM0 or COM3
    #[arg(long)]
    port: Option<String>,
    /// JSON session config; flags override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    baud: Option<u32>,
    /// Host frame rate (ticks per second)
    #[arg(long)]
    fps: Option<f64>,
    /// Six comma separated factors: locX,locY,locZ,rotX,rotY,rotZ
    #[arg(long, value_delimiter = ',')]
    scale: Option<Vec<f64>>,
    /// Bind this transform (x,y,z,rx,ry,rz; radians) and start immediately
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    at: Option<Vec<f64>>,
    /// Skip the device boot delay
    #[arg(long)]
    no_settle: bool,
    /// Decode and log frames instead of opening a port
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Command::Ports { json: true } => {
            println!("{}", serde_json::to_string_pretty(&list_ports())?);
            Ok(())
        }
        Command::Ports { json: false } => {
            for p in list_ports() {
                match p.description {
                    Some(d) => println!("{}\t{}\t{}", p.port_name, p.port_type, d),
                    None => println!("{}\t{}", p.port_name, p.port_type),
                }
            }
            Ok(())
        }
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };
    if let Some(port) = args.port {
        cfg.port = Some(port);
    }
    if let Some(baud) = args.baud {
        cfg.baud = baud;
    }
    if let Some(fps) = args.fps {
        cfg.frame_rate = fps;
    }
    if let Some(scale) = args.scale {
        cfg.scale = ScaleConfig::new(six(&scale)?);
    }
    if args.no_settle || args.dry_run {
        cfg.settle_ms = 0;
    }
    cfg.validate()?;
    let port = cfg.port.clone().context("no serial port given (--port or config)")?;

    let scene = SharedScene::new(cfg.frame_rate);
    if let Some(at) = &args.at {
        scene.bind(transform(&six(at)?));
    }

    let autostart = args.at.is_some();
    if args.dry_run {
        let session = StreamingSession::new(DryRunOpener, cfg.link_settings());
        drive(session, &port, &cfg, scene, autostart)
    } else {
        let session = StreamingSession::serial(cfg.link_settings());
        drive(session, &port, &cfg, scene, autostart)
    }
}

// stdin is the control surface: one command per line
fn drive<O: LinkOpener>(
    session: StreamingSession<O>,
    port: &str,
    cfg: &SessionConfig,
    scene: SharedScene,
    autostart: bool,
) -> Result<()> {
    let source = Arc::new(scene.clone());
    if autostart {
        start(&session, port, cfg, &source);
    }

    for line in io::stdin().lock().lines() {
        let line = line?;
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["start"] => start(&session, port, cfg, &source),
            ["stop"] => {
                if session.is_running() {
                    session.stop();
                    info!("Stopped");
                }
            }
            ["status"] => match session.last_failure() {
                Some(why) => info!("{} ({why})", session.state()),
                None => info!("{}", session.state()),
            },
            ["unbind"] => scene.unbind(),
            ["fps", rate] => match rate.parse::<f64>() {
                Ok(r) => scene.set_frame_rate(r),
                Err(e) => warn!("bad frame rate {rate:?}: {e}"),
            },
            ["quit"] | ["exit"] => break,
            values => match parse_values(values) {
                Ok(v) => {
                    let t = transform(&v);
                    if scene.transform().is_some() {
                        scene.set_transform(t);
                    } else {
                        scene.bind(t);
                    }
                }
                Err(e) => warn!("{e:#}"),
            },
        }
    }

    session.stop();
    Ok(())
}

fn start<O: LinkOpener>(
    session: &StreamingSession<O>,
    port: &str,
    cfg: &SessionConfig,
    source: &Arc<SharedScene>,
) {
    match session.start(port, source.clone(), cfg.scale) {
        Ok(()) => info!("Running"),
        Err(e) if e.is_warning() => warn!("{e}"),
        Err(e) => warn!("start failed: {e}"),
    }
}

fn parse_values(words: &[&str]) -> Result<[f64; 6]> {
    let values = words
        .iter()
        .map(|w| w.parse::<f64>().with_context(|| format!("not a number: {w:?}")))
        .collect::<Result<Vec<_>>>()?;
    six(&values)
}

fn six(values: &[f64]) -> Result<[f64; 6]> {
    match <[f64; 6]>::try_from(values) {
        Ok(v) => Ok(v),
        Err(_) => bail!("expected 6 values, got {}", values.len()),
    }
}

fn transform(v: &[f64; 6]) -> Transform {
    Transform::new([v[0], v[1], v[2]], [v[3], v[4], v[5]])
}
