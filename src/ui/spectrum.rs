use bytemuck::Zeroable;
use std::sync::Arc;
use wgpu::{util::DeviceExt, Buffer, Device, Queue, RenderPipeline};

use crate::analyzer::{FrequencyFrame, BIN_COUNT};

// Bar geometry constants
const BAR_WIDTH_FACTOR: f32 = 1.5; // Bars overlap their even share by half
const BAR_GAP_PX: f32 = 1.0; // Fixed gap between neighbouring bars
const MIN_BAR_HEIGHT_PX: f32 = 2.0; // Keep silent bins faintly visible
const MIN_OPACITY: f32 = 0.08; // Opacity floor for silent bins
const MARKER_WIDTH_PX: f32 = 2.0; // Playback marker thickness

const BAR_COLOR: [f32; 3] = [0.42, 0.72, 1.0];
const MARKER_COLOR: [f32; 4] = [1.0, 0.45, 0.25, 1.0];
const PLACEHOLDER_OPACITY: f32 = 0.18;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 2],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct BarInstance {
    position: [f32; 2],
    size: [f32; 2],
    color: [f32; 4],
}

impl Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

impl BarInstance {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<BarInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

/// Instanced bar renderer for one frequency frame plus the playback
/// marker. Geometry is recomputed from the incoming frame every draw;
/// bars that fall past the right edge of the panel are dropped and the
/// scissor rect clips any partial overhang.
pub struct SpectrumView {
    queue: Arc<Queue>,
    render_pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    instance_buffer: Buffer,
    region_width: u32,
    region_height: u32,
    instance_count: u32,
}

impl SpectrumView {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        region_width: u32,
        region_height: u32,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Spectrum Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("spectrum.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Spectrum Pipeline Layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Spectrum Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), BarInstance::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState {
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::SrcAlpha,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
            cache: None,
        });

        // Unit quad shared by every bar instance
        let vertices = [
            Vertex {
                position: [0.0, 0.0],
            },
            Vertex {
                position: [1.0, 0.0],
            },
            Vertex {
                position: [0.0, 1.0],
            },
            Vertex {
                position: [1.0, 1.0],
            },
        ];

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Spectrum Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Sized for the worst case: every bin visible plus the marker
        let capacity = vec![BarInstance::zeroed(); BIN_COUNT + 1];
        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Spectrum Instance Buffer"),
            contents: bytemuck::cast_slice(&capacity),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        Self {
            queue,
            render_pipeline,
            vertex_buffer,
            instance_buffer,
            region_width,
            region_height,
            instance_count: 0,
        }
    }

    pub fn set_region(&mut self, width: u32, height: u32) {
        self.region_width = width;
        self.region_height = height;
    }

    /// Rebuild the instance buffer for one frame. `progress` positions
    /// the playback marker; a disabled panel shows the dim baseline with
    /// no marker at all.
    pub fn update(&mut self, frame: &FrequencyFrame, progress: f32, enabled: bool) {
        let instances = build_bar_instances(
            &frame.bins,
            self.region_width,
            self.region_height,
            progress,
            enabled,
        );
        self.instance_count = instances.len() as u32;
        self.queue
            .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
    }

    /// Draw into a caller-managed pass whose viewport and scissor are
    /// already set to the spectrum panel
    pub fn render_with_pass<'a, 'b>(&'a self, render_pass: &mut wgpu::RenderPass<'b>)
    where
        'a: 'b,
    {
        render_pass.set_pipeline(&self.render_pipeline);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        render_pass.draw(0..4, 0..self.instance_count);
    }
}

/// Lay out one frame of bars in normalized device coordinates for the
/// panel viewport. Each bar takes one and a half times its even share of
/// the width and advances by its width plus a one pixel gap, so the tail
/// of the bins runs off the right edge by construction.
fn build_bar_instances(
    bins: &[u8; BIN_COUNT],
    region_width: u32,
    region_height: u32,
    progress: f32,
    enabled: bool,
) -> Vec<BarInstance> {
    let w = region_width.max(1) as f32;
    let h = region_height.max(1) as f32;
    let bar_width = w / BIN_COUNT as f32 * BAR_WIDTH_FACTOR;

    let mut instances = Vec::with_capacity(BIN_COUNT + 1);
    for (i, &bin) in bins.iter().enumerate() {
        let x = i as f32 * (bar_width + BAR_GAP_PX);
        if x >= w {
            break;
        }

        let level = if enabled { bin as f32 / 255.0 } else { 0.0 };
        let bar_height = (level * h).max(MIN_BAR_HEIGHT_PX);
        let alpha = if enabled {
            level.max(MIN_OPACITY)
        } else {
            PLACEHOLDER_OPACITY
        };

        instances.push(BarInstance {
            position: [x / w * 2.0 - 1.0, -1.0],
            size: [bar_width / w * 2.0, bar_height / h * 2.0],
            color: [BAR_COLOR[0], BAR_COLOR[1], BAR_COLOR[2], alpha],
        });
    }

    if enabled {
        let marker_x = (progress.clamp(0.0, 1.0) * w - MARKER_WIDTH_PX / 2.0)
            .clamp(0.0, w - MARKER_WIDTH_PX);
        instances.push(BarInstance {
            position: [marker_x / w * 2.0 - 1.0, -1.0],
            size: [MARKER_WIDTH_PX / w * 2.0, 2.0],
            color: MARKER_COLOR,
        });
    }

    instances
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px_x(instance: &BarInstance, region_width: f32) -> f32 {
        (instance.position[0] + 1.0) / 2.0 * region_width
    }

    fn px_width(instance: &BarInstance, region_width: f32) -> f32 {
        instance.size[0] / 2.0 * region_width
    }

    #[test]
    fn bar_width_is_one_and_a_half_times_the_even_share() {
        let bins = [0u8; BIN_COUNT];
        let instances = build_bar_instances(&bins, 256, 128, 0.0, true);
        // 256 / 128 * 1.5 = 3 px
        assert_eq!(px_width(&instances[0], 256.0), 3.0);
    }

    #[test]
    fn bars_advance_by_width_plus_one_pixel_gap() {
        let bins = [0u8; BIN_COUNT];
        let instances = build_bar_instances(&bins, 256, 128, 0.0, true);
        let step = px_x(&instances[1], 256.0) - px_x(&instances[0], 256.0);
        assert_eq!(step, 4.0);
    }

    #[test]
    fn bars_past_the_right_edge_are_dropped() {
        let bins = [0u8; BIN_COUNT];
        let instances = build_bar_instances(&bins, 256, 128, 0.0, true);
        // 64 bars fit a 256 px panel at a 4 px advance, plus the marker
        assert_eq!(instances.len(), 65);
    }

    #[test]
    fn magnitude_drives_height_and_opacity() {
        let mut bins = [0u8; BIN_COUNT];
        bins[0] = 255;
        let instances = build_bar_instances(&bins, 256, 128, 0.0, true);

        // Full-scale bin fills the panel height at full opacity
        assert_eq!(instances[0].size[1], 2.0);
        assert_eq!(instances[0].color[3], 1.0);

        // Silent bin keeps the minimum height and the opacity floor
        assert_eq!(instances[1].size[1], 2.0 * MIN_BAR_HEIGHT_PX / 128.0);
        assert_eq!(instances[1].color[3], MIN_OPACITY);
    }

    #[test]
    fn marker_tracks_progress() {
        let bins = [0u8; BIN_COUNT];
        let instances = build_bar_instances(&bins, 464, 140, 0.5, true);

        let marker = instances.last().unwrap();
        assert_eq!(marker.color, MARKER_COLOR);
        assert_eq!(marker.size[1], 2.0);
        assert!((px_x(marker, 464.0) - 231.0).abs() < 0.01);
        assert!((px_width(marker, 464.0) - MARKER_WIDTH_PX).abs() < 0.01);
    }

    #[test]
    fn marker_stays_inside_the_panel_at_the_extremes() {
        let bins = [0u8; BIN_COUNT];

        let start = build_bar_instances(&bins, 464, 140, 0.0, true);
        assert!(px_x(start.last().unwrap(), 464.0) >= 0.0);

        let end = build_bar_instances(&bins, 464, 140, 1.0, true);
        let x = px_x(end.last().unwrap(), 464.0);
        assert!(x <= 464.0 - MARKER_WIDTH_PX + 0.01);
    }

    #[test]
    fn disabled_panel_draws_dim_baseline_without_marker() {
        let mut bins = [0u8; BIN_COUNT];
        bins[3] = 200;
        let instances = build_bar_instances(&bins, 256, 128, 0.7, false);

        // No marker appended
        assert_eq!(instances.len(), 64);
        for instance in &instances {
            assert_eq!(instance.color[3], PLACEHOLDER_OPACITY);
            assert_eq!(instance.size[1], 2.0 * MIN_BAR_HEIGHT_PX / 128.0);
        }
    }
}
