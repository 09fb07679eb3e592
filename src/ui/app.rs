use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::audio_player::{AudioPlayer, MediaEvent};
use crate::config::AppConfig;

use super::layout;
use super::window::WindowState;

struct App {
    state: Option<WindowState>,
    pending_player: Option<AudioPlayer>,
    media_rx: Option<broadcast::Receiver<MediaEvent>>,
    window_width: u32,
    window_height: u32,
    autoplay: bool,
    init_error: Option<anyhow::Error>,
}

impl App {
    /// Apply everything the player broadcast since the last batch of
    /// window events
    fn drain_media_events(&mut self) {
        let (Some(state), Some(rx)) = (self.state.as_mut(), self.media_rx.as_mut()) else {
            return;
        };
        loop {
            match rx.try_recv() {
                Ok(event) => state.apply_media_event(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::debug!("Skipped {} media events", skipped);
                }
                Err(_) => break,
            }
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title("stemscope")
            .with_inner_size(LogicalSize::new(
                self.window_width as f64,
                self.window_height as f64,
            ))
            .with_min_inner_size(LogicalSize::new(
                layout::MIN_WINDOW_WIDTH as f64,
                layout::MIN_WINDOW_HEIGHT as f64,
            ));

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.init_error = Some(anyhow::Error::new(e).context("Failed to create window"));
                event_loop.exit();
                return;
            }
        };

        match WindowState::new(window, self.pending_player.take()) {
            Ok(mut state) => {
                if self.autoplay {
                    state.toggle_playback();
                }
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                self.init_error = Some(e.context("Failed to initialize rendering"));
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                state.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                state.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                state.draw();
            }
            WindowEvent::CursorMoved { position, .. } => {
                state.handle_cursor_moved(position);
            }
            WindowEvent::CursorLeft { .. } => {
                state.handle_cursor_left();
            }
            WindowEvent::MouseInput {
                state: element_state,
                button,
                ..
            } => {
                state.handle_mouse_input(button, element_state);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(code),
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => {
                    state.shutdown();
                    event_loop.exit();
                }
                KeyCode::Space => {
                    state.toggle_playback();
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.drain_media_events();
    }
}

/// Bring up the window and run until it closes. A `None` player renders
/// the disabled placeholder surface instead.
pub fn run(
    player: Option<AudioPlayer>,
    media_rx: Option<broadcast::Receiver<MediaEvent>>,
    config: &AppConfig,
) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App {
        state: None,
        pending_player: player,
        media_rx,
        window_width: config.window.width,
        window_height: config.window.height,
        autoplay: config.playback.autoplay,
        init_error: None,
    };

    event_loop
        .run_app(&mut app)
        .context("Event loop terminated abnormally")?;

    match app.init_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
