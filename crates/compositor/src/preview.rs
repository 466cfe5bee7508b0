//! Tiled background preview fed by the compositor's visible surface.
//!
//! The preview owns every GPU resource it draws with. Its only contact with
//! the compositor is a read of the visible surface, taken by copying it into
//! the preview's own texture before drawing.

use crossbeam_channel::Receiver;
use image::RgbaImage;

use crate::compile::ShaderError;
use crate::compositor::{Compositor, CompositorError, FrameReady};
use crate::gpu::context::{GpuContext, QuadBuffers};
use crate::gpu::program::{ShaderProgram, QUAD_VERTEX_SHADER};
use crate::gpu::readback;
use crate::gpu::targets::Texture2D;
use crate::gpu::uniforms::Uniforms;

const TILE_FRAGMENT: &str = r"
layout(std140, set = 1, binding = 0) uniform Params {
    vec2 uResolution;
    vec2 uTileCount;
    vec4 uBackdrop;
    float uOpacity;
} params;

void main() {
    vec2 uv = vTextureCoord;
    float aspect = params.uResolution.y / params.uResolution.x;
    uv.y *= aspect;
    uv = fract(uv * params.uTileCount);
    vec4 color = texture(uSampler, uv);
    fragColor = mix(params.uBackdrop, vec4(color.rgb, 1.0), color.a * params.uOpacity);
}
";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewVisibility {
    Shown,
    #[default]
    Faded,
    Hidden,
}

impl PreviewVisibility {
    fn opacity(self, faded: f32) -> f32 {
        match self {
            PreviewVisibility::Shown => 1.0,
            PreviewVisibility::Faded => faded,
            PreviewVisibility::Hidden => 0.0,
        }
    }
}

impl std::str::FromStr for PreviewVisibility {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shown" | "show" => Ok(PreviewVisibility::Shown),
            "faded" | "fade" => Ok(PreviewVisibility::Faded),
            "hidden" | "hide" => Ok(PreviewVisibility::Hidden),
            other => Err(format!("unknown preview state '{other}' (expected shown, faded or hidden)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewOptions {
    /// Tiles across (x) and down (y).
    pub tiles: [f32; 2],
    /// Opacity of the tiles while faded.
    pub faded_opacity: f32,
    /// Colour behind the tiles.
    pub backdrop: [f32; 4],
    pub visibility: PreviewVisibility,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            tiles: [4.0, 4.0],
            faded_opacity: 0.25,
            backdrop: [0.0, 0.0, 0.0, 1.0],
            visibility: PreviewVisibility::Faded,
        }
    }
}

pub struct PreviewSurface {
    quad: QuadBuffers,
    sampler: wgpu::Sampler,
    program: ShaderProgram,
    copy: Texture2D,
    output: Texture2D,
    options: PreviewOptions,
    frames: Option<Receiver<FrameReady>>,
    last_serial: Option<u64>,
}

impl PreviewSurface {
    pub fn new(
        ctx: &GpuContext,
        width: u32,
        height: u32,
        options: PreviewOptions,
    ) -> Result<Self, ShaderError> {
        let device = ctx.device();
        let program = ShaderProgram::new(ctx, "preview tiles", QUAD_VERTEX_SHADER, TILE_FRAGMENT)?;
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("preview sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let layout = &ctx.layouts().input;
        let copy = Texture2D::new(device, layout, &sampler, "preview source", 1, 1);
        let output = Texture2D::new(
            device,
            layout,
            &sampler,
            "preview output",
            width.max(1),
            height.max(1),
        );
        Ok(Self {
            quad: QuadBuffers::new(device, "preview"),
            sampler,
            program,
            copy,
            output,
            options,
            frames: None,
            last_serial: None,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        self.output.size()
    }

    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        let (width, height) = (width.max(1), height.max(1));
        if self.output.size() == (width, height) {
            return;
        }
        let output = Texture2D::new(
            ctx.device(),
            &ctx.layouts().input,
            &self.sampler,
            "preview output",
            width,
            height,
        );
        std::mem::replace(&mut self.output, output).destroy();
        tracing::debug!(width, height, "resized preview surface");
    }

    pub fn visibility(&self) -> PreviewVisibility {
        self.options.visibility
    }

    pub fn set_visibility(&mut self, visibility: PreviewVisibility) {
        self.options.visibility = visibility;
    }

    /// Flips between shown and faded. A hidden preview becomes shown.
    pub fn toggle_fade(&mut self) -> PreviewVisibility {
        self.options.visibility = match self.options.visibility {
            PreviewVisibility::Faded => PreviewVisibility::Shown,
            PreviewVisibility::Shown => PreviewVisibility::Faded,
            PreviewVisibility::Hidden => PreviewVisibility::Shown,
        };
        self.options.visibility
    }

    pub fn set_tiles(&mut self, tiles: [f32; 2]) {
        self.options.tiles = tiles.map(|count| count.max(1.0));
    }

    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    /// Listens for the compositor's frame signals; see [`Self::render_if_ready`].
    pub fn attach(&mut self, frames: Receiver<FrameReady>) {
        self.frames = Some(frames);
    }

    /// Re-renders if a new frame was signalled since the last call.
    pub fn render_if_ready(&mut self, compositor: &Compositor) -> bool {
        let Some(ready) = self.frames.as_ref().and_then(|frames| frames.try_iter().last()) else {
            return false;
        };
        // The signal may be older than the canvas; record the frame actually sampled.
        let sampled = compositor.last_frame().map_or(ready.serial, |frame| frame.serial);
        self.last_serial = Some(sampled.max(ready.serial));
        self.render(compositor);
        true
    }

    /// Serial of the frame sampled by the last [`Self::render_if_ready`].
    pub fn last_serial(&self) -> Option<u64> {
        self.last_serial
    }

    /// Samples the compositor's visible surface and draws it tiled.
    pub fn render(&mut self, compositor: &Compositor) {
        let ctx = compositor.context();
        let device = ctx.device();
        let visible = compositor.visible_surface();
        let has_image = compositor.image_size().is_some();

        if has_image && self.copy.size() != visible.size() {
            let (width, height) = visible.size();
            let copy = Texture2D::new(
                device,
                &ctx.layouts().input,
                &self.sampler,
                "preview source",
                width,
                height,
            );
            std::mem::replace(&mut self.copy, copy).destroy();
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("preview frame"),
        });
        if has_image {
            visible.copy_to(&mut encoder, &self.copy);
        }

        let (width, height) = self.output.size();
        let opacity = if has_image {
            self.options.visibility.opacity(self.options.faded_opacity)
        } else {
            0.0
        };
        let uniforms = Uniforms::new()
            .with("uResolution", [width as f32, height as f32])
            .with("uTileCount", self.options.tiles)
            .with("uBackdrop", self.options.backdrop)
            .with("uOpacity", opacity);
        self.program.stage_uniforms(device, &mut encoder, &uniforms);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("preview tiles"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.output.view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.program.draw(&mut pass, self.copy.bind_group(), &self.quad);
        }
        ctx.queue().submit(Some(encoder.finish()));
        tracing::trace!(width, height, visibility = ?self.options.visibility, "rendered preview");
    }

    /// Reads back the preview output.
    pub fn snapshot(&self, ctx: &GpuContext) -> Result<RgbaImage, CompositorError> {
        Ok(readback::read_texture(ctx.device(), ctx.queue(), &self.output)?)
    }
}
