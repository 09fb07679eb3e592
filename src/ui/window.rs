use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;

use winit::{
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton},
    window::Window,
};

use crate::analyzer::{AnalysisGraph, FrequencyFrame, SampleTap};
use crate::audio_player::{AudioPlayer, MediaEvent};
use crate::progress::{progress_ratio, ProgressPair};

use super::buttons::TransportButton;
use super::event_handler::EventHandler;
use super::layout::{self, UiLayout};
use super::readout::ProgressReadout;
use super::render_pipeline::RenderPipelines;
use super::spectrum::SpectrumView;

const READOUT_COLOR: [f32; 4] = [0.85, 0.87, 0.92, 1.0];
const READOUT_DIM_COLOR: [f32; 4] = [0.55, 0.56, 0.6, 1.0];

/// Keeps RedrawRequested re-arming itself only while playback runs. On a
/// stop the frame already in flight still lands, drawing the final
/// marker position, and then the loop goes quiet until the next play.
pub struct RedrawGate {
    running: bool,
}

impl RedrawGate {
    pub fn new() -> Self {
        Self { running: false }
    }

    pub fn on_play(&mut self) {
        self.running = true;
    }

    pub fn on_stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the draw that just finished should schedule the next one
    pub fn rearm(&self) -> bool {
        self.running
    }
}

/// Create the analysis graph on first use. At most one graph exists per
/// player; later play cycles keep feeding the same one.
fn ensure_graph(graph: &mut Option<AnalysisGraph>, tap: &Arc<RwLock<SampleTap>>) -> bool {
    if graph.is_some() {
        return false;
    }
    *graph = Some(AnalysisGraph::new(tap.clone()));
    true
}

pub struct WindowState {
    pub window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
    layout: UiLayout,
    render_pipelines: RenderPipelines,
    spectrum: SpectrumView,
    transport: TransportButton,
    readout: ProgressReadout,
    event_handler: EventHandler,
    player: Option<AudioPlayer>,
    graph: Option<AnalysisGraph>,
    progress: ProgressPair,
    gate: RedrawGate,
    enabled: bool,
}

impl WindowState {
    /// A `None` player puts the whole surface into the disabled mode:
    /// dim placeholder bars, inert pointer handling, and the
    /// unavailability notice in the transport row.
    pub fn new(window: Arc<Window>, player: Option<AudioPlayer>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .context("Failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("No suitable GPU adapter found")?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .context("Failed to acquire GPU device")?;
        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let layout = UiLayout::new(width, height);
        let render_pipelines = RenderPipelines::new(&device, &config);

        let (_, _, region_width, region_height) = layout.spectrum_region();
        let spectrum = SpectrumView::new(
            device.clone(),
            queue.clone(),
            region_width,
            region_height,
            config.format,
        );

        let enabled = player.is_some();
        let mut transport = TransportButton::new(
            &device,
            layout.transport_button_position(),
            (layout::TRANSPORT_BUTTON_SIZE, layout::TRANSPORT_BUTTON_SIZE),
            config.format,
        );
        transport.set_enabled(enabled);

        let readout = ProgressReadout::new(
            device.clone(),
            queue.clone(),
            PhysicalSize::new(width, height),
            config.format,
        );

        // Seed the readout from the player directly in case the metadata
        // event fired before the UI subscribed
        let mut progress = ProgressPair::new();
        if let Some(player) = &player {
            progress.set(progress_ratio(player.position_secs(), player.duration_secs()));
        }

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            layout,
            render_pipelines,
            spectrum,
            transport,
            readout,
            event_handler: EventHandler::new(),
            player,
            graph: None,
            progress,
            gate: RedrawGate::new(),
            enabled,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);

            self.layout.update_dimensions(width, height);

            let (_, _, region_width, region_height) = self.layout.spectrum_region();
            self.spectrum.set_region(region_width, region_height);
            self.transport
                .set_position(self.layout.transport_button_position());
            self.readout.resize(PhysicalSize::new(width, height));
        }
    }

    /// Flip between play and pause. The first play of this player also
    /// brings up the analysis graph.
    pub fn toggle_playback(&mut self) {
        if !self.enabled {
            return;
        }
        let Some(player) = &self.player else {
            return;
        };

        if player.is_playing() {
            player.pause();
        } else {
            if ensure_graph(&mut self.graph, &player.tap()) {
                log::debug!("Analysis graph created");
            }
            if let Err(e) = player.play() {
                log::warn!("Failed to start playback: {e:#}");
            }
        }
    }

    pub fn apply_media_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata | MediaEvent::TimeUpdate => {
                self.reconcile_progress();
            }
            MediaEvent::Play => {
                self.gate.on_play();
                self.transport.set_showing_pause(true);
                self.reconcile_progress();
                self.window.request_redraw();
            }
            MediaEvent::Pause | MediaEvent::Ended => {
                self.gate.on_stop();
                self.transport.set_showing_pause(false);
                self.reconcile_progress();
                // One more frame lands to show the resting marker
                self.window.request_redraw();
            }
        }
    }

    /// Bring both progress copies back in line with the player
    fn reconcile_progress(&mut self) {
        if let Some(player) = &self.player {
            self.progress
                .set(progress_ratio(player.position_secs(), player.duration_secs()));
        }
    }

    pub fn seek_to_ratio(&mut self, ratio: f32) {
        if !self.enabled {
            return;
        }
        let Some(player) = &self.player else {
            return;
        };

        let duration = player.duration_secs();
        if !duration.is_finite() || duration <= 0.0 {
            // Track length unknown, scrubbing has no target
            return;
        }

        if let Err(e) = player.seek_to(ratio as f64 * duration) {
            log::warn!("Seek failed: {e:#}");
        }
        // The marker follows the pointer immediately instead of waiting
        // for the next progress tick
        self.progress.set(ratio);
        self.window.request_redraw();
    }

    pub fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.event_handler.cursor_position = Some(position);
        if !self.enabled {
            return;
        }

        self.transport.handle_mouse_move(position);
        if let Some(ratio) = self
            .event_handler
            .gesture
            .drag(&self.layout, position.x)
        {
            self.seek_to_ratio(ratio);
        }
        self.window.request_redraw();
    }

    pub fn handle_mouse_input(&mut self, button: MouseButton, state: ElementState) {
        let Some(position) = self.event_handler.cursor_position else {
            return;
        };
        if !self.enabled {
            return;
        }

        match state {
            ElementState::Pressed => {
                self.transport.handle_pointer_event(button, state, position);
                if button == MouseButton::Left {
                    if let Some(ratio) =
                        self.event_handler
                            .gesture
                            .press(&self.layout, position.x, position.y)
                    {
                        self.seek_to_ratio(ratio);
                    }
                }
            }
            ElementState::Released => {
                // The drag ends no matter where the release lands or
                // whether the last seek went through
                if button == MouseButton::Left {
                    self.event_handler.gesture.release();
                }
                if self.transport.handle_pointer_event(button, state, position) {
                    self.toggle_playback();
                }
            }
        }
        self.window.request_redraw();
    }

    pub fn handle_cursor_left(&mut self) {
        self.event_handler.cursor_position = None;
        // Leaving the window is as final as releasing the button
        self.event_handler.gesture.release();
        self.transport.reset_hover();
        self.window.request_redraw();
    }

    /// Tear down playback and analysis. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(player) = &mut self.player {
            player.close();
        }
        if let Some(graph) = &mut self.graph {
            graph.close();
        }
        self.gate.on_stop();
    }

    pub fn draw(&mut self) {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.window.request_redraw();
                return;
            }
            Err(e) => {
                log::warn!("Dropped a frame: {}", e);
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        self.render_pipelines.draw_background(&mut encoder, &view);

        // A compositor can force the window below the layout minimum;
        // drop the chrome for those frames so no viewport leaves the
        // surface
        if self.config.width < layout::MIN_WINDOW_WIDTH
            || self.config.height < layout::MIN_WINDOW_HEIGHT
        {
            self.queue.submit(std::iter::once(encoder.finish()));
            output.present();
            if self.gate.rearm() {
                self.window.request_redraw();
            }
            return;
        }

        let (px, py, pw, ph) = self.layout.spectrum_region();
        self.render_pipelines
            .draw_panel(&mut encoder, &view, px, py, pw, ph);

        // One spectrum frame per draw while the graph is live; the
        // silent frame keeps the resting baseline and marker up
        let frame = match &mut self.graph {
            Some(graph) => graph.process(),
            None => FrequencyFrame::silent(),
        };
        self.spectrum
            .update(&frame, self.progress.fast(), self.enabled);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Spectrum Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_viewport(px as f32, py as f32, pw as f32, ph as f32, 0.0, 1.0);
            render_pass.set_scissor_rect(px, py, pw, ph);
            self.spectrum.render_with_pass(&mut render_pass);
        }

        let playing = self
            .player
            .as_ref()
            .map(|p| p.is_playing())
            .unwrap_or(false);
        self.transport.set_showing_pause(playing);
        self.transport.render(&view, &mut encoder, &self.queue);

        let (text_x, text_y) = self.layout.readout_position();
        if self.enabled {
            let label = self.progress.percent_label();
            self.readout
                .render(&view, &mut encoder, &label, text_x, text_y, READOUT_COLOR);
        } else {
            self.readout.render(
                &view,
                &mut encoder,
                "stem unavailable",
                text_x,
                text_y,
                READOUT_DIM_COLOR,
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if self.gate.rearm() {
            self.window.request_redraw();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_rearms_only_while_running() {
        let mut gate = RedrawGate::new();
        assert!(!gate.rearm());

        gate.on_play();
        assert!(gate.rearm());
        assert!(gate.rearm());

        gate.on_stop();
        assert!(!gate.rearm());
    }

    #[test]
    fn graph_is_created_once_and_reused_across_play_cycles() {
        let tap = Arc::new(RwLock::new(SampleTap::new()));
        let mut graph = None;

        assert!(ensure_graph(&mut graph, &tap));
        assert!(graph.is_some());

        // Pause then play again: the same graph keeps serving
        assert!(!ensure_graph(&mut graph, &tap));
        assert!(!ensure_graph(&mut graph, &tap));
        assert!(!graph.as_ref().unwrap().is_closed());
    }
}
