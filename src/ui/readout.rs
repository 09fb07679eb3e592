use glyphon::{
    Attrs, Buffer, Cache, Color, Family, FontSystem, Metrics, Resolution, Shaping, SwashCache,
    TextArea, TextAtlas, TextBounds, TextRenderer as GlyphonTextRenderer, Viewport,
};
use std::sync::Arc;
use wgpu::{Device, Queue, TextureView};
use winit::dpi::PhysicalSize;

const FONT_SIZE: f32 = 13.0;
const LINE_HEIGHT: f32 = 16.0;

/// Single-line text renderer for the transport row, backed by glyphon.
/// Draws the playback percentage, or the unavailability notice when the
/// stem never became playable.
pub struct ProgressReadout {
    font_system: FontSystem,
    cache: SwashCache,
    atlas: TextAtlas,
    renderer: GlyphonTextRenderer,
    buffer: Buffer,
    device: Arc<Device>,
    queue: Arc<Queue>,
    size: PhysicalSize<u32>,
    viewport: Viewport,
}

impl ProgressReadout {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        size: PhysicalSize<u32>,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let mut font_system = FontSystem::new();
        let cache = SwashCache::new();

        // Without system fonts nothing renders
        font_system.db_mut().load_system_fonts();

        let cache_ref = Cache::new(&device);
        let viewport = Viewport::new(&device, &cache_ref);
        let mut atlas = TextAtlas::new(&device, &queue, &cache_ref, surface_format);
        let renderer =
            GlyphonTextRenderer::new(&mut atlas, &device, wgpu::MultisampleState::default(), None);

        let mut buffer = Buffer::new(&mut font_system, Metrics::new(FONT_SIZE, LINE_HEIGHT));
        buffer.set_size(
            &mut font_system,
            Some(size.width as f32),
            Some(size.height as f32),
        );

        Self {
            font_system,
            cache,
            atlas,
            renderer,
            buffer,
            device,
            queue,
            size,
            viewport,
        }
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.size = size;

        self.buffer.set_size(
            &mut self.font_system,
            Some(size.width as f32),
            Some(size.height as f32),
        );

        self.viewport.update(
            &self.queue,
            Resolution {
                width: size.width,
                height: size.height,
            },
        );
    }

    pub fn render(
        &mut self,
        view: &TextureView,
        encoder: &mut wgpu::CommandEncoder,
        text: &str,
        x: f32,
        y: f32,
        color: [f32; 4],
    ) {
        if text.is_empty() {
            return;
        }

        let text_color = Color::rgba(
            (color[0] * 255.0) as u8,
            (color[1] * 255.0) as u8,
            (color[2] * 255.0) as u8,
            (color[3] * 255.0) as u8,
        );

        self.buffer.set_text(
            &mut self.font_system,
            text,
            Attrs::new().family(Family::SansSerif).color(text_color),
            Shaping::Advanced,
        );
        self.buffer.shape_until_scroll(&mut self.font_system, true);

        self.viewport.update(
            &self.queue,
            Resolution {
                width: self.size.width,
                height: self.size.height,
            },
        );

        let text_area = TextArea {
            buffer: &self.buffer,
            left: x,
            top: y,
            scale: 1.0,
            bounds: TextBounds {
                left: 0,
                top: 0,
                right: self.size.width as i32,
                bottom: self.size.height as i32,
            },
            default_color: text_color,
            custom_glyphs: &[],
        };

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Readout Render Pass"),
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

        if self
            .renderer
            .prepare(
                &self.device,
                &self.queue,
                &mut self.font_system,
                &mut self.atlas,
                &self.viewport,
                [text_area],
                &mut self.cache,
            )
            .is_ok()
        {
            let _ = self
                .renderer
                .render(&self.atlas, &self.viewport, &mut render_pass);
        }

        drop(render_pass);

        // Trim the atlas to free up memory
        self.atlas.trim();
    }
}
