use std::time::Instant;
use wgpu::{self, util::DeviceExt};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton},
};

// Animation constants
const ANIMATION_DURATION: f32 = 0.1;
const HOVER_SCALE: f32 = 1.1;
const PRESS_SCALE: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum ButtonState {
    Normal,
    Hover,
    Pressed,
}

/// Play/pause toggle drawn entirely in the shader. The icon choice and
/// the dimmed disabled look are fed through a small uniform; press and
/// hover feedback scale the viewport the quad is drawn into.
pub struct TransportButton {
    state: ButtonState,
    previous_state: ButtonState,
    position: (u32, u32),
    size: (u32, u32),
    vertices: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    icon_buffer: wgpu::Buffer,
    icon_bind_group: wgpu::BindGroup,
    showing_pause: bool,
    enabled: bool,
    pressed_here: bool,
    animation_active: bool,
    animation_start_time: Instant,
    animation_progress: f32,
    scale: f32,
}

impl TransportButton {
    pub fn new(
        device: &wgpu::Device,
        position: (u32, u32),
        size: (u32, u32),
        format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Transport Button Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("button.wgsl").into()),
        });

        let icon_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Transport Button Icon Buffer"),
            contents: bytemuck::cast_slice(&[0.0f32, 0.0, 0.0, 0.0]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("Transport Button Bind Group Layout"),
        });

        let icon_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: icon_buffer.as_entire_binding(),
            }],
            label: Some("Transport Button Bind Group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Transport Button Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Transport Button Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_icon"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: 8,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_icon"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Transport Button Vertices"),
            contents: bytemuck::cast_slice(&[
                -1.0f32, -1.0, //
                1.0, -1.0, //
                -1.0, 1.0, //
                1.0, 1.0, //
            ]),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            state: ButtonState::Normal,
            previous_state: ButtonState::Normal,
            position,
            size,
            vertices,
            pipeline,
            icon_buffer,
            icon_bind_group,
            showing_pause: false,
            enabled: true,
            pressed_here: false,
            animation_active: false,
            animation_start_time: Instant::now(),
            animation_progress: 0.0,
            scale: 1.0,
        }
    }

    pub fn set_position(&mut self, position: (u32, u32)) {
        self.position = position;
    }

    pub fn set_showing_pause(&mut self, showing_pause: bool) {
        self.showing_pause = showing_pause;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.state = ButtonState::Normal;
            self.pressed_here = false;
        }
    }

    fn contains_point(&self, x: f64, y: f64) -> bool {
        let (button_x, button_y) = self.position;
        let (button_width, button_height) = self.size;

        x >= button_x as f64
            && x <= (button_x + button_width) as f64
            && y >= button_y as f64
            && y <= (button_y + button_height) as f64
    }

    fn set_state(&mut self, state: ButtonState) {
        if self.state != state {
            self.previous_state = self.state;
            self.state = state;

            self.animation_active = true;
            self.animation_start_time = Instant::now();
            self.animation_progress = 0.0;
        }
    }

    pub fn handle_mouse_move(&mut self, position: PhysicalPosition<f64>) {
        if !self.enabled {
            return;
        }

        if self.contains_point(position.x, position.y) {
            if self.state == ButtonState::Normal {
                self.set_state(ButtonState::Hover);
            }
        } else if self.state != ButtonState::Normal {
            // Moving off a held button cancels the press
            self.set_state(ButtonState::Normal);
            self.pressed_here = false;
        }
    }

    /// Returns true when a press that began on the button is released on
    /// it, which is the moment the toggle fires
    pub fn handle_pointer_event(
        &mut self,
        button: MouseButton,
        state: ElementState,
        position: PhysicalPosition<f64>,
    ) -> bool {
        if !self.enabled || button != MouseButton::Left {
            return false;
        }

        let over_button = self.contains_point(position.x, position.y);
        match state {
            ElementState::Pressed => {
                if over_button {
                    self.set_state(ButtonState::Pressed);
                    self.pressed_here = true;
                }
                false
            }
            ElementState::Released => {
                let fired = self.pressed_here && over_button;
                self.pressed_here = false;
                if fired {
                    self.set_state(ButtonState::Hover);
                } else if self.state == ButtonState::Pressed {
                    self.set_state(ButtonState::Normal);
                }
                fired
            }
        }
    }

    pub fn reset_hover(&mut self) {
        self.set_state(ButtonState::Normal);
        self.pressed_here = false;
    }

    fn update_animation(&mut self) {
        if !self.animation_active {
            return;
        }

        let elapsed = self.animation_start_time.elapsed().as_secs_f32();
        self.animation_progress = (elapsed / ANIMATION_DURATION).min(1.0);

        let start_scale = Self::scale_for(self.previous_state);
        let end_scale = Self::scale_for(self.state);
        self.scale = start_scale + self.animation_progress * (end_scale - start_scale);

        if self.animation_progress >= 1.0 {
            self.animation_active = false;
            self.scale = end_scale;
        }
    }

    fn scale_for(state: ButtonState) -> f32 {
        match state {
            ButtonState::Normal => 1.0,
            ButtonState::Hover => HOVER_SCALE,
            ButtonState::Pressed => PRESS_SCALE,
        }
    }

    pub fn render(
        &mut self,
        view: &wgpu::TextureView,
        encoder: &mut wgpu::CommandEncoder,
        queue: &wgpu::Queue,
    ) {
        self.update_animation();

        let icon = [
            if self.showing_pause { 1.0f32 } else { 0.0 },
            if self.enabled { 0.0 } else { 1.0 },
            0.0,
            0.0,
        ];
        queue.write_buffer(&self.icon_buffer, 0, bytemuck::cast_slice(&icon));

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Transport Button Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
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

        // Scale the viewport from the button center for the press
        // and hover feedback
        let (center_x, center_y) = (
            self.position.0 as f32 + (self.size.0 as f32 / 2.0),
            self.position.1 as f32 + (self.size.1 as f32 / 2.0),
        );
        let scaled_width = self.size.0 as f32 * self.scale;
        let scaled_height = self.size.1 as f32 * self.scale;
        let scaled_x = center_x - (scaled_width / 2.0);
        let scaled_y = center_y - (scaled_height / 2.0);

        render_pass.set_viewport(scaled_x, scaled_y, scaled_width, scaled_height, 0.0, 1.0);

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.icon_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertices.slice(..));
        render_pass.draw(0..4, 0..1);
    }
}
