// Application window - winit driven by polling
//
// winit 0.30 normally owns the main loop (`run_app`). The renderer needs the
// loop instead, so events are pumped on demand: `poll_events` drains what is
// pending without blocking, `wait_events` blocks until something arrives.

use anyhow::{bail, Context, Result};
use raw_window_handle::{
    DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowAttributes, WindowId};

use super::event::{parse_key_code, translate_window_event, Control, Handlers, InputEvent};
use crate::config::{ControlsConfig, WindowConfig};
use crate::render::{Extent, SurfaceProvider};

/// How long construction waits per pump for the window to appear
const CREATE_PUMP_TIMEOUT: Duration = Duration::from_millis(16);

/// Everything the event callbacks touch
struct WindowState {
    attributes: WindowAttributes,
    window: Option<Arc<Window>>,
    creation_error: Option<String>,
    extent: Extent,
    resized: bool,
    close_requested: bool,
    handlers: Handlers<Window>,
}

impl ApplicationHandler for WindowState {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        match event_loop.create_window(self.attributes.clone()) {
            Ok(window) => {
                let size = window.inner_size();
                self.extent = Extent::new(size.width, size.height);
                self.window = Some(Arc::new(window));
            }
            Err(e) => {
                self.creation_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(input) = translate_window_event(&event) else {
            return;
        };

        match input {
            InputEvent::Resized(extent) => {
                log::debug!("Window resized to {}x{}", extent.width, extent.height);
                self.extent = extent;
                self.resized = true;
            }
            InputEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.close_requested = true;
            }
            _ => {}
        }

        if let Some(window) = &self.window {
            if self.handlers.dispatch(&input, window) == Control::Exit {
                self.close_requested = true;
            }
        }
    }
}

/// A single window plus the event loop feeding it
///
/// IMPORTANT: any Vulkan surface created from this window must be destroyed
/// before the window is dropped.
pub struct AppWindow {
    state: WindowState,
    window: Arc<Window>,
    event_loop: EventLoop<()>,
    title: String,
    fps: FpsCounter,
    show_fps: bool,
}

impl AppWindow {
    /// Create the event loop and pump it until the window exists
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("Failed to create event loop")?;

        let mut attributes = Window::default_attributes()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);
        if config.fullscreen {
            attributes = attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let mut state = WindowState {
            attributes,
            window: None,
            creation_error: None,
            extent: Extent::default(),
            resized: false,
            close_requested: false,
            handlers: Handlers::new(),
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(CREATE_PUMP_TIMEOUT), &mut state);

            if let Some(e) = state.creation_error.take() {
                bail!("Failed to create window: {}", e);
            }
            if let Some(window) = &state.window {
                break window.clone();
            }
            if let PumpStatus::Exit(code) = status {
                bail!("Event loop exited with code {} before the window was created", code);
            }
        };

        // The initial size is already known
        state.resized = false;

        log::info!(
            "Window: {}x{} ({})",
            state.extent.width,
            state.extent.height,
            if config.fullscreen { "fullscreen" } else { "windowed" }
        );

        Ok(Self {
            state,
            window,
            event_loop,
            title: config.title.clone(),
            fps: FpsCounter::new(Instant::now()),
            show_fps: false,
        })
    }

    /// Register an input handler. Handlers see events in registration order.
    pub fn on_event<F>(&mut self, handler: F)
    where
        F: FnMut(&InputEvent, &Window) -> Control + 'static,
    {
        self.state.handlers.push(handler);
    }

    /// Install the quit and fullscreen key bindings
    pub fn bind_controls(&mut self, controls: &ControlsConfig) {
        match parse_key_code(&controls.quit_key) {
            Some(quit) => self.on_event(move |event, _| match event {
                InputEvent::KeyPressed(code) if *code == quit => {
                    log::info!("{:?} pressed, exiting...", quit);
                    Control::Exit
                }
                _ => Control::Continue,
            }),
            None => log::warn!("Unknown quit key '{}', binding disabled", controls.quit_key),
        }

        match parse_key_code(&controls.fullscreen_key) {
            Some(toggle) => self.on_event(move |event, window| match event {
                InputEvent::KeyPressed(code) if *code == toggle => {
                    toggle_fullscreen(window);
                    Control::Handled
                }
                _ => Control::Continue,
            }),
            None => log::warn!(
                "Unknown fullscreen key '{}', binding disabled",
                controls.fullscreen_key
            ),
        }
    }

    /// Show frames per second in the title, refreshed once per second
    pub fn set_show_fps(&mut self, show_fps: bool) {
        self.show_fps = show_fps;
        if !show_fps {
            self.window.set_title(&self.title);
        }
    }

    /// Count one presented frame
    pub fn frame_presented(&mut self) {
        if !self.show_fps {
            return;
        }
        if let Some(report) = self.fps.tick(Instant::now()) {
            let mode = if self.window.fullscreen().is_some() {
                "fullscreen"
            } else {
                "windowed"
            };
            self.window.set_title(&format!(
                "{} - {:.0} FPS ({:.2}ms) [{}]",
                self.title, report.fps, report.frame_ms, mode
            ));
        }
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            log::debug!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }
}

impl SurfaceProvider for AppWindow {
    fn extent(&self) -> Extent {
        self.state.extent
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn was_resized(&self) -> bool {
        self.state.resized
    }

    fn reset_resized_flag(&mut self) {
        self.state.resized = false;
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}

impl HasWindowHandle for AppWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for AppWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

/// Switch between borderless fullscreen on the current monitor and windowed
pub fn toggle_fullscreen(window: &Window) {
    if window.fullscreen().is_some() {
        window.set_fullscreen(None);
        log::info!("Exited fullscreen mode");
    } else {
        window.set_fullscreen(Some(Fullscreen::Borderless(None)));
        log::info!("Entered fullscreen mode");
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsReport {
    pub fps: f32,
    /// Duration of the last frame
    pub frame_ms: f32,
}

/// Frame counter that reports once per elapsed second
#[derive(Debug, Clone)]
pub struct FpsCounter {
    frame_count: u32,
    last_report: Instant,
    last_frame: Instant,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            frame_count: 0,
            last_report: now,
            last_frame: now,
        }
    }

    pub fn tick(&mut self, now: Instant) -> Option<FpsReport> {
        let frame_time = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.frame_count += 1;

        let elapsed = now.duration_since(self.last_report).as_secs_f32();
        if elapsed < 1.0 {
            return None;
        }

        let report = FpsReport {
            fps: self.frame_count as f32 / elapsed,
            frame_ms: frame_time * 1000.0,
        };
        self.frame_count = 0;
        self.last_report = now;
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn fps_reports_once_per_second() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);

        for i in 1..60 {
            assert!(counter.tick(start + Duration::from_millis(i * 16)).is_none());
        }

        let report = counter
            .tick(start + Duration::from_millis(1000))
            .expect("a second has passed");
        assert_relative_eq!(report.fps, 60.0);
        assert_relative_eq!(report.frame_ms, 56.0, epsilon = 1e-3);

        assert!(counter
            .tick(start + Duration::from_millis(1016))
            .is_none());
    }
}
