//! winit window driven by `pump_app_events`.

use crate::{PlatformConfig, PlatformError, Result, WindowSurface};
use raw_window_handle::{HasDisplayHandle, RawDisplayHandle};
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

/// Pump attempts made while waiting for the platform to hand out the window.
const CREATE_ATTEMPTS: u32 = 100;

/// Window plus the event loop that feeds it.
///
/// The loop is pumped from [`WindowSurface::poll_events`] and
/// [`WindowSurface::wait_events`]; window events are buffered for the
/// application and drained with [`PlatformWindow::drain_events`].
pub struct PlatformWindow {
    event_loop: EventLoop<()>,
    state: EventState,
    window: Window,
}

struct EventState {
    config: PlatformConfig,
    /// Only populated until construction finishes.
    pending_window: Option<Window>,
    created: bool,
    creation_error: Option<String>,
    resized: bool,
    close_requested: bool,
    events: Vec<WindowEvent>,
}

impl ApplicationHandler for EventState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.created {
            return;
        }
        self.created = true;

        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        match event_loop.create_window(attributes) {
            Ok(window) => {
                tracing::info!(
                    "Window created: {}x{}",
                    self.config.width,
                    self.config.height
                );
                self.pending_window = Some(window);
            }
            Err(e) => self.creation_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match &event {
            WindowEvent::Resized(size) => {
                tracing::trace!("Window resized to {}x{}", size.width, size.height);
                self.resized = true;
            }
            WindowEvent::CloseRequested => self.close_requested = true,
            _ => {}
        }
        self.events.push(event);
    }
}

impl PlatformWindow {
    /// Create the event loop and a window, pumping until the window exists.
    pub fn new(config: PlatformConfig) -> Result<Self> {
        let mut event_loop =
            EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;

        let mut state = EventState {
            config,
            pending_window: None,
            created: false,
            creation_error: None,
            resized: false,
            close_requested: false,
            events: Vec::new(),
        };

        for _ in 0..CREATE_ATTEMPTS {
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut state)
            {
                return Err(PlatformError::EventLoop(format!(
                    "event loop exited with code {code} before the window was created"
                )));
            }
            if let Some(error) = state.creation_error.take() {
                return Err(PlatformError::WindowCreation(error));
            }
            if let Some(window) = state.pending_window.take() {
                return Ok(Self {
                    event_loop,
                    state,
                    window,
                });
            }
        }

        Err(PlatformError::WindowCreation(
            "platform never resumed the event loop".to_string(),
        ))
    }

    /// The underlying winit window.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Display handle, for choosing instance extensions.
    pub fn raw_display_handle(&self) -> Result<RawDisplayHandle> {
        self.window
            .display_handle()
            .map(|handle| handle.as_raw())
            .map_err(|e| PlatformError::Handle(e.to_string()))
    }

    /// Take the window events received since the last call.
    pub fn drain_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.state.events)
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            tracing::debug!("Event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }
}

impl WindowSurface for PlatformWindow {
    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.state.resized)
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}
