mod camera;
mod render;
mod station;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use checkin_core::{CheckinConfig, CheckinController, HttpCheckinService};
use clap::Parser;
use log::info;

use crate::camera::StillFileCamera;
use crate::station::{channel_sink, Station};

#[derive(Parser, Debug)]
#[command(version, about = "Face recognition check-in station", long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the recognition service; overrides config and CHECKIN_API_HOST
    #[arg(long)]
    api_host: Option<String>,

    /// Camera device to use instead of the detected front camera
    #[arg(short, long)]
    device: Option<String>,

    /// Check in with this JPEG instead of a camera
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Show the full emotion breakdown with each match
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<CheckinConfig> {
    let mut config = CheckinConfig::discover(args.config.as_deref())?;
    config.apply_env_overrides();

    if let Some(host) = &args.api_host {
        config.service.api_host = host.clone();
    }
    if let Some(device) = &args.device {
        config.camera.device = Some(device.clone());
    }
    if let Some(image) = &args.image {
        config.camera.still_image = Some(image.clone());
    }
    Ok(config)
}

fn run<C>(camera: C, config: &CheckinConfig, verbose: bool) -> Result<()>
where
    C: checkin_core::Camera + Send,
{
    let service = HttpCheckinService::new(&config.service);
    info!("Recognition service at {}", service.base_url());

    let (tx, rx) = async_channel::unbounded();
    let controller = CheckinController::new(camera, service, channel_sink(tx.clone()));

    let stdin = io::stdin();
    let mut station = Station::new(controller, tx, rx, stdin.lock(), io::stdout(), verbose);
    station.run().context("Terminal I/O failed")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    if let Some(image) = config.camera.still_image.clone() {
        if !camera::still_image_exists(&image) {
            anyhow::bail!("Still image {:?} not found", image);
        }
        info!("Using still image {:?} as camera", image);
        let mut camera = StillFileCamera::new(image);
        camera::wait_for_permission(&mut camera, &config.camera, &mut io::stdout());
        return run(camera, &config, args.verbose);
    }

    run_with_device(&config, args.verbose)
}

#[cfg(feature = "opencv-camera")]
fn run_with_device(config: &CheckinConfig, verbose: bool) -> Result<()> {
    let mut out = io::stdout();
    let info = camera::wait_for_front_camera(&config.camera, &mut out);
    let mut camera = camera::V4l2Camera::new(info, config.camera.clone());
    camera::wait_for_permission(&mut camera, &config.camera, &mut out);
    run(camera, config, verbose)
}

#[cfg(not(feature = "opencv-camera"))]
fn run_with_device(_config: &CheckinConfig, _verbose: bool) -> Result<()> {
    anyhow::bail!(
        "Built without camera support; \
         pass --image <file.jpg> or rebuild with --features opencv-camera"
    )
}
