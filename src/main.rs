//! interactive3d-view: drives a headless model view from the command line.
//!
//! Loads a model through the same command channel an embedding host uses,
//! runs the frame loop, simulates taps once the load has finished and prints
//! every selection event as one JSON line on stdout.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use interactive3d::app::commands::{LoadEnvironmentArgs, LoadModelArgs, PatchColorArg, SetZoomArgs};
use interactive3d::app::channel;
use interactive3d::assets::{LoadState, ResourceMap};
use interactive3d::config::load_config;
use interactive3d::render::Rgba;
use interactive3d::{
    FrameDriver, HeadlessEngine, ModelView, NodeHandle, ViewerCommand, ViewerConfig, ViewerEvent,
};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Frames to wait for a load fence before giving up.
const LOAD_FRAME_LIMIT: u32 = 600;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless interactive model view")]
struct Args {
    /// Model file (.glb or .gltf)
    model: PathBuf,

    /// Directory holding external resources referenced by a .gltf model
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Viewer config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entity name to select once the model has loaded (repeatable)
    #[arg(long = "preselect")]
    preselect: Vec<String>,

    /// Global selection color: r,g,b,a
    #[arg(long, value_parser = parse_color)]
    selection_color: Option<Rgba>,

    /// Per-part color: NAME=r,g,b,a (repeatable)
    #[arg(long = "patch", value_parser = parse_patch)]
    patches: Vec<(String, Rgba)>,

    /// Tap at X,Y in surface pixels, top-left origin (repeatable)
    #[arg(long = "tap", value_parser = parse_point)]
    taps: Vec<(f32, f32)>,

    /// Frames to run after the model is ready
    #[arg(long, default_value_t = 10)]
    frames: u32,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Camera zoom level (> 0)
    #[arg(long)]
    zoom: Option<f64>,

    /// Indirect light (IBL) file
    #[arg(long, requires = "skybox")]
    ibl: Option<PathBuf>,

    /// Skybox file
    #[arg(long, requires = "ibl")]
    skybox: Option<PathBuf>,
}

fn parse_color(value: &str) -> Result<Rgba, String> {
    let components = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|err| format!("invalid component {part:?}: {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Rgba::from_components(&components).map_err(|err| err.to_string())
}

fn components(color: Rgba) -> Vec<f64> {
    color.0.iter().map(|&c| c as f64).collect()
}

fn parse_patch(value: &str) -> Result<(String, Rgba), String> {
    let (name, color) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=r,g,b,a, got {value:?}"))?;
    Ok((name.to_string(), parse_color(color)?))
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {value:?}"))?;
    let x = x.trim().parse::<f32>().map_err(|err| err.to_string())?;
    let y = y.trim().parse::<f32>().map_err(|err| err.to_string())?;
    Ok((x, y))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Host-side script: everything a platform shell would send over its method
/// channel, in order.
fn host_commands(args: &Args) -> Result<Vec<ViewerCommand<NodeHandle>>> {
    let name = args
        .model
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("model path {} has no file name", args.model.display()))?
        .to_string();
    let resources = match &args.resources {
        Some(dir) => ResourceMap::from_dir(dir)?,
        None => ResourceMap::new(),
    };
    log::info!("{} external resources available", resources.len());

    let mut commands = Vec::new();
    if let (Some(ibl), Some(skybox)) = (&args.ibl, &args.skybox) {
        commands.push(ViewerCommand::LoadEnvironment(LoadEnvironmentArgs {
            ibl_bytes: read_file(ibl)?,
            skybox_bytes: read_file(skybox)?,
        }));
    }
    if let Some(zoom) = args.zoom {
        commands.push(ViewerCommand::SetZoomLevel(SetZoomArgs { zoom }));
    }
    commands.push(ViewerCommand::LoadModel(LoadModelArgs {
        model_bytes: read_file(&args.model)?,
        name,
        resources: resources.into_entries(),
        preselected_entities: (!args.preselect.is_empty()).then(|| args.preselect.clone()),
        selection_color: args.selection_color.map(components),
        patch_colors: (!args.patches.is_empty()).then(|| {
            args.patches
                .iter()
                .map(|(name, color)| PatchColorArg {
                    name: name.clone(),
                    color: components(*color),
                })
                .collect()
        }),
    }));
    Ok(commands)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    let commands = host_commands(&args)?;

    let mut view = ModelView::new(HeadlessEngine::new(args.width, args.height), config)?;
    view.set_viewport(args.width, args.height);
    view.add_listener(Box::new(|event: &ViewerEvent<NodeHandle>| {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(err) => log::error!("Failed to encode selection event: {err}"),
        }
    }));

    let (sender, queue) = channel::<NodeHandle>();
    let host = thread::spawn(move || -> Result<()> {
        for command in commands {
            if let Err(err) = sender.send(command)?.wait() {
                log::error!("Host command failed: {} ({err})", err.code());
            }
        }
        Ok(())
    });

    let mut driver = FrameDriver::new(Instant::now());
    driver.start();

    let mut taps = args.taps.iter().copied();
    let mut waited = 0;
    let mut ready_frames = 0;
    loop {
        view.drain_commands(&queue);
        let host_done = host.is_finished();

        match view.load_state().clone() {
            LoadState::Ready { .. } => {
                if let Some((x, y)) = taps.next() {
                    log::info!("Tap at ({x}, {y})");
                    view.on_tap(x, y);
                } else if host_done {
                    ready_frames += 1;
                }
            }
            LoadState::Failed { name, reason } if host_done => {
                log::error!("Model {name} failed to load: {reason}");
                break;
            }
            LoadState::Idle if host_done => {
                log::error!("No model was installed");
                break;
            }
            _ => {
                waited += 1;
                if waited > LOAD_FRAME_LIMIT {
                    log::error!("Model did not finish loading after {LOAD_FRAME_LIMIT} frames");
                    break;
                }
            }
        }
        if ready_frames > args.frames {
            break;
        }

        driver.tick(Instant::now(), &mut view);
        thread::sleep(FRAME_INTERVAL);
    }

    driver.stop();
    host.join()
        .map_err(|_| anyhow!("host command thread panicked"))??;

    log::info!(
        "{} frames rendered, {} dropped, {} selected at exit",
        view.engine().frames_rendered(),
        driver.dropped_frames(),
        view.selection().len()
    );
    view.destroy();
    Ok(())
}
