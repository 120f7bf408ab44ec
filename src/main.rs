// =============================================================================
// LUMEN2D - demo shell
// =============================================================================
//
// Loads config.toml (or the path given as the first argument), opens the
// window, builds the Vulkan objects and hands everything to the frame
// orchestrator until the window closes.
//
// =============================================================================

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use lumen2d::backend::{RenderContext, ShaderPaths, SwapchainConfig, VertexModel, VulkanDevice};
use lumen2d::config::Config;
use lumen2d::platform::AppWindow;
use lumen2d::render::{FrameOrchestrator, FrameOutcome, FrameSettings};
use lumen2d::scene::{spawn_triangle_fan, SceneState};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let loaded = Config::load(config_path.as_deref());
    let config = &loaded.config;

    init_logging(config);
    log::info!("Starting lumen2d");
    loaded.log_messages();
    log::info!("Present mode: {}", config.graphics.present_mode);

    if let Err(e) = run(config) {
        log::error!("Fatal error: {:?}", e);
        std::process::exit(1);
    }

    log::info!("Cleanup complete");
}

/// Initialize logging, optionally writing to a file instead of stderr.
/// RUST_LOG overrides the configured level.
fn init_logging(config: &Config) {
    let level = config.log_level();
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.as_ref().copied().unwrap_or(log::LevelFilter::Info));
    builder.parse_default_env();

    let mut file_error = None;
    if config.debug.log_to_file {
        match open_log_file(&config.debug.log_file) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => file_error = Some(e),
        }
    }

    builder.init();

    if let Err(e) = level {
        log::warn!("{}, defaulting to info", e);
    }
    if let Some(e) = file_error {
        log::warn!("Logging to stderr: {:#}", e);
    }
}

/// Create/clear the log file and write a header
fn open_log_file(path: &str) -> Result<File> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path))?;

    writeln!(file, "=== lumen2d log ===")?;
    writeln!(file, "Started: {:?}", std::time::SystemTime::now())?;
    writeln!(file)?;
    Ok(file)
}

// =============================================================================
// APPLICATION
// =============================================================================

fn run(config: &Config) -> Result<()> {
    let mut window = AppWindow::new(&config.window)?;
    window.bind_controls(&config.controls);
    window.set_show_fps(config.debug.show_fps);

    // The surface inside the device must go before the window, so every Arc
    // to it ends up owned by the orchestrator (which drops the window last)
    let device = VulkanDevice::new(
        &config.window.title,
        config.debug.validation_layers,
        &window,
    )?;

    let context = RenderContext::new(
        device.clone(),
        ShaderPaths {
            vertex: config.shaders.vertex.clone(),
            fragment: config.shaders.fragment.clone(),
        },
        SwapchainConfig {
            present_mode: config.get_present_mode(),
            frames_in_flight: config.frames_in_flight(),
        },
    )?;

    let triangle = Rc::new(VertexModel::triangle(device).context("Failed to create model")?);
    let mut scene = SceneState::new();
    spawn_triangle_fan(&mut scene, triangle, config.scene.object_count);

    let settings = FrameSettings {
        clear_color: config.graphics.clear_color,
        rotation_step: config.scene.rotation_step,
    };

    let mut orchestrator = FrameOrchestrator::new(window, Arc::new(context), scene, settings)?;
    orchestrator.run_with(|window, outcome| {
        if outcome != FrameOutcome::Skipped {
            window.frame_presented();
        }
    })
}
