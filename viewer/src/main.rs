use std::{collections::VecDeque, time::Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colorview_camera::{Recorder, SenseManager, SyntheticSenseManager, DEFAULT_DEVICE};
use colorview_pump::{
    DisplaySurface, FramePump, ImageSurface, TickOutcome, COLOR_HEIGHT, COLOR_WIDTH,
};
use crossbeam_channel::{bounded, Receiver};
use log::{error, info};
use sdl2::render::Texture;

mod display;

const TITLE: &str = "Color Sample";
const FPS_WINDOW_SIZE: usize = 30;
const FPS_LOG_EVERY: u64 = 150;

// ================ CLI ================== //

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    /// V4L2 camera through GStreamer
    Gst,
    /// Generated test pattern, no camera needed
    Synthetic,
}

#[derive(Parser, Debug)]
#[command(name = "colorview", about = "Live color stream from a camera")]
struct CliArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Gst)]
    backend: BackendKind,

    /// Video device the GStreamer backend opens
    #[arg(long, default_value = DEFAULT_DEVICE)]
    device: String,

    /// Close the window after this many rendered frames
    #[arg(long)]
    num_frames: Option<u64>,
}

// ================ FPS ================== //

struct FpsMeter {
    window: VecDeque<Instant>,
}

impl FpsMeter {
    fn new() -> Self {
        Self { window: VecDeque::with_capacity(FPS_WINDOW_SIZE) }
    }

    fn push(&mut self, at: Instant) {
        self.window.push_back(at);
        if self.window.len() > FPS_WINDOW_SIZE {
            self.window.pop_front();
        }
    }

    fn fps(&self) -> f64 {
        match (self.window.front(), self.window.back()) {
            (Some(first), Some(last)) if self.window.len() >= 2 => {
                let secs = last.duration_since(*first).as_secs_f64();
                if secs > 0.0 { (self.window.len() - 1) as f64 / secs } else { 0.0 }
            }
            _ => 0.0,
        }
    }
}

// ================ RENDER LOOP ================== //

fn run<S, F>(args: &CliArgs, shutdown: &Receiver<()>, create: F) -> Result<()>
where
    S: SenseManager,
    F: FnOnce() -> colorview_camera::Result<S>,
{
    let mut window = display::Window::open(TITLE, COLOR_WIDTH, COLOR_HEIGHT)?;
    let creator = window.texture_creator();
    let mut texture: Option<Texture> = None;
    let mut uploaded = 0u64;

    // Loaded: initialise the session, subscribe to ticks
    let mut pump: FramePump<S> = FramePump::new(ImageSurface::new());
    if let Err(e) = pump.loaded(create) {
        error!("{e}");
        window.show_error(&e.to_string());
        return Err(e).context("camera setup failed");
    }
    info!("streaming {}x{} from {:?} backend", COLOR_WIDTH, COLOR_HEIGHT, args.backend);

    let mut fps = FpsMeter::new();
    loop {
        if window.close_requested() || shutdown.try_recv().is_ok() {
            break;
        }

        if pump.rendering() == Some(TickOutcome::Rendered) {
            fps.push(Instant::now());
            let rendered = pump.stats().rendered;
            if rendered % FPS_LOG_EVERY == 0 {
                info!("avg {:.1} FPS (last {} frames)", fps.fps(), FPS_WINDOW_SIZE);
            }
        }

        let surface = pump.surface();
        if surface.generation() != uploaded {
            if let Some(bitmap) = surface.source() {
                display::upload(&creator, &mut texture, bitmap)?;
            }
            uploaded = surface.generation();
        }
        window.present(texture.as_ref())?;

        if args.num_frames.is_some_and(|n| pump.stats().rendered >= n) {
            break;
        }
    }

    // Unloaded: unsubscribe, tear down
    pump.unloaded();
    let stats = pump.stats();
    info!(
        "done: {} rendered, {} skipped, {} without color, {} failed",
        stats.rendered, stats.skipped, stats.no_color, stats.failed
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CliArgs::parse();

    // Ctrl-C takes the same unload path as closing the window
    let (tx_shutdown, rx_shutdown) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = tx_shutdown.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    match args.backend {
        #[cfg(feature = "gst")]
        BackendKind::Gst => {
            let device = args.device.clone();
            run(&args, &rx_shutdown, move || colorview_camera::GstSenseManager::create(device))
        }
        #[cfg(not(feature = "gst"))]
        BackendKind::Gst => anyhow::bail!("built without the `gst` feature; use --backend synthetic"),
        BackendKind::Synthetic => {
            let recorder = Recorder::new();
            run(&args, &rx_shutdown, || SyntheticSenseManager::create(&recorder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fps_needs_two_samples() {
        let mut meter = FpsMeter::new();
        assert_eq!(meter.fps(), 0.0);
        meter.push(Instant::now());
        assert_eq!(meter.fps(), 0.0);
    }

    #[test]
    fn fps_over_window() {
        let mut meter = FpsMeter::new();
        let start = Instant::now();
        for i in 0..40 {
            meter.push(start + Duration::from_millis(i * 50));
        }
        assert_eq!(meter.window.len(), FPS_WINDOW_SIZE);
        assert!((meter.fps() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn cli_defaults() {
        let args = CliArgs::parse_from(["colorview"]);
        assert_eq!(args.backend, BackendKind::Gst);
        assert_eq!(args.device, DEFAULT_DEVICE);
        assert!(args.num_frames.is_none());

        let args = CliArgs::parse_from(["colorview", "--backend", "synthetic", "--num-frames", "5"]);
        assert_eq!(args.backend, BackendKind::Synthetic);
        assert_eq!(args.num_frames, Some(5));
    }
}
