use std::rc::{Rc, Weak};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbaImage;

use crate::gpu::context::GpuContext;
use crate::gpu::readback::{self, ReadbackError};
use crate::gpu::targets::{RenderTargetPool, Texture2D, TextureId, POOL_SLOTS};
use crate::gpu::uniforms::BindOutcome;
use crate::provider::{PassDescriptor, PassOutput, PassProvider};
use crate::types::CompositorOptions;

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("image must have positive dimensions, got {width}x{height}")]
    InvalidImage { width: u32, height: u32 },
    #[error("cannot allocate {width}x{height} render targets: {reason}")]
    ResourceResize {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("no image is loaded")]
    NoImage,
    #[error("nothing has been rendered from the current image")]
    NoFrame,
    #[error("failed to read back the visible surface: {0}")]
    Readback(#[from] ReadbackError),
}

/// Where a planned pass writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassTarget {
    /// The visible surface, at the surface's own size.
    Screen,
    /// A render target pool slot, at image size.
    Slot(usize),
}

/// What a planned pass samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainInput {
    Source,
    Slot(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep {
    pub index: usize,
    pub input: ChainInput,
    pub target: PassTarget,
}

/// Routes a chain of `len` passes through the two pool slots.
///
/// Pass `i` writes slot `i % 2` unless it is the last pass, which writes the
/// screen. Pass 0 reads the source image, every later pass reads what its
/// predecessor wrote.
pub fn plan_chain(len: usize) -> Vec<ChainStep> {
    let mut steps = Vec::with_capacity(len);
    let mut input = ChainInput::Source;
    for index in 0..len {
        let target = if index + 1 == len {
            PassTarget::Screen
        } else {
            PassTarget::Slot(index % POOL_SLOTS)
        };
        steps.push(ChainStep {
            index,
            input,
            target,
        });
        if let PassTarget::Slot(slot) = target {
            input = ChainInput::Slot(slot);
        }
    }
    steps
}

/// One executed draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    pub program: String,
    pub input: TextureId,
    pub target: PassTarget,
    pub output: TextureId,
    pub viewport: (u32, u32),
    pub uniforms: Vec<BindOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub serial: u64,
    pub provider: String,
    pub chained: bool,
    pub passes: Vec<PassRecord>,
}

impl FrameReport {
    pub fn draw_count(&self) -> usize {
        self.passes.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The provider reported a chain with no passes.
    EmptyChain { provider: String },
    /// Off-screen targets are missing for a chain that needs them.
    TargetsUnavailable,
    /// The device rejected the frame's commands.
    Gpu(String),
}

/// Result of a `render()` call. Per-frame problems are never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Nothing to draw: no active provider or no image.
    Idle,
    Rendered(FrameReport),
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            FrameOutcome::Rendered(report) => Some(report),
            _ => None,
        }
    }
}

/// Signal sent to subscribers after every rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReady {
    pub serial: u64,
    pub width: u32,
    pub height: u32,
}

/// The multi-pass pipeline: owns the source image and the render target pool
/// and executes whatever the active provider reports.
pub struct Compositor {
    ctx: GpuContext,
    options: CompositorOptions,
    source: Option<Texture2D>,
    pool: RenderTargetPool,
    image_size: Option<(u32, u32)>,
    provider: Option<Weak<dyn PassProvider>>,
    serial: u64,
    last_frame: Option<FrameReport>,
    /// The canvas holds a render of the current source image.
    frame_current: bool,
    subscribers: Vec<Sender<FrameReady>>,
}

impl Compositor {
    pub fn new(ctx: GpuContext, options: CompositorOptions) -> Self {
        Self {
            ctx,
            options,
            source: None,
            pool: RenderTargetPool::new(),
            image_size: None,
            provider: None,
            serial: 0,
            last_frame: None,
            frame_current: false,
            subscribers: Vec::new(),
        }
    }

    /// Uploads `image` as the new source and renders it.
    ///
    /// When the dimensions change, the source texture, both pool targets and
    /// the visible surface are recreated together; if any allocation fails,
    /// the previous image and targets stay active.
    pub fn load_image(&mut self, image: &RgbaImage) -> Result<FrameOutcome, CompositorError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CompositorError::InvalidImage { width, height });
        }
        let limit = self.ctx.max_texture_dimension();
        if width > limit || height > limit {
            return Err(CompositorError::ResourceResize {
                width,
                height,
                reason: format!("exceeds the device texture limit of {limit}"),
            });
        }

        match &self.source {
            Some(source) if self.image_size == Some((width, height)) => {
                source.write_rgba(self.ctx.queue(), image.as_raw());
                tracing::debug!(texture = ?source.id(), "rewrote source texture in place");
            }
            _ => self.reallocate(image)?,
        }

        self.image_size = Some((width, height));
        self.frame_current = false;
        tracing::info!(width, height, "loaded image");
        Ok(self.render())
    }

    fn reallocate(&mut self, image: &RgbaImage) -> Result<(), CompositorError> {
        let (width, height) = image.dimensions();
        let ctx = &self.ctx;
        let ((source, pair, canvas), error) = ctx.with_error_scope(|| {
            (
                ctx.create_texture("source image", width, height),
                ctx.create_target_pair(width, height),
                ctx.create_texture("visible surface", width, height),
            )
        });
        if let Some(error) = error {
            source.destroy();
            pair.destroy();
            canvas.destroy();
            tracing::warn!(width, height, %error, "render target allocation failed; keeping previous image");
            return Err(CompositorError::ResourceResize {
                width,
                height,
                reason: error.to_string(),
            });
        }

        source.write_rgba(self.ctx.queue(), image.as_raw());
        if let Some(previous) = self.source.replace(source) {
            previous.destroy();
        }
        self.pool.install(pair);
        self.ctx.install_canvas(canvas);
        Ok(())
    }

    /// Makes `provider` the active one and renders with it.
    ///
    /// Only a weak reference is kept; dropping the last strong reference
    /// elsewhere deactivates the provider.
    pub fn set_provider(&mut self, provider: &Rc<dyn PassProvider>) -> FrameOutcome {
        tracing::debug!(provider = provider.label(), "switched provider");
        self.provider = Some(Rc::downgrade(provider));
        self.render()
    }

    pub fn clear_provider(&mut self) {
        self.provider = None;
    }

    pub fn active_provider(&self) -> Option<Rc<dyn PassProvider>> {
        self.provider.as_ref().and_then(Weak::upgrade)
    }

    /// Executes the active provider's passes into the visible surface.
    pub fn render(&mut self) -> FrameOutcome {
        let Some(provider) = self.active_provider() else {
            return FrameOutcome::Idle;
        };
        if self.source.is_none() {
            return FrameOutcome::Idle;
        }

        let passes = provider.passes();
        let chained = passes.is_chained();
        let descriptors = passes.into_descriptors();
        if descriptors.is_empty() {
            tracing::warn!(provider = provider.label(), "provider reported no passes; frame skipped");
            return FrameOutcome::Skipped(SkipReason::EmptyChain {
                provider: provider.label().to_string(),
            });
        }

        let (executed, error) = self.ctx.with_error_scope(|| self.execute(&descriptors));
        let executed = match error {
            Some(error) => Err(SkipReason::Gpu(error.to_string())),
            None => executed,
        };
        let records = match executed {
            Ok(records) => records,
            Err(reason) => {
                tracing::warn!(provider = provider.label(), ?reason, "frame skipped");
                return FrameOutcome::Skipped(reason);
            }
        };

        self.serial += 1;
        let report = FrameReport {
            serial: self.serial,
            provider: provider.label().to_string(),
            chained,
            passes: records,
        };
        tracing::trace!(serial = report.serial, passes = report.draw_count(), "rendered frame");
        self.last_frame = Some(report.clone());
        self.frame_current = true;
        self.notify();
        FrameOutcome::Rendered(report)
    }

    fn execute(&self, descriptors: &[PassDescriptor<'_>]) -> Result<Vec<PassRecord>, SkipReason> {
        let source = self.source.as_ref().ok_or(SkipReason::TargetsUnavailable)?;
        let image_size = source.size();
        let canvas = self.ctx.canvas();
        let device = self.ctx.device();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("compositor frame"),
        });
        let mut records = Vec::with_capacity(descriptors.len());

        for (step, descriptor) in plan_chain(descriptors.len()).into_iter().zip(descriptors) {
            let input = match step.input {
                ChainInput::Source => source,
                ChainInput::Slot(slot) => self
                    .pool
                    .slot(slot)
                    .ok_or(SkipReason::TargetsUnavailable)?
                    .texture(),
            };
            let (output, viewport) = match step.target {
                PassTarget::Screen => (canvas, self.ctx.surface_size()),
                PassTarget::Slot(slot) => (
                    self.pool
                        .slot(slot)
                        .ok_or(SkipReason::TargetsUnavailable)?
                        .texture(),
                    image_size,
                ),
            };
            let requested = match descriptor.output {
                PassOutput::Screen => PassTarget::Screen,
                PassOutput::Slot(slot) => PassTarget::Slot(slot),
            };
            if requested != step.target {
                tracing::trace!(pass = step.index, ?requested, actual = ?step.target, "pass output rerouted");
            }

            let program = descriptor.program;
            let staged = program.stage_uniforms(device, &mut encoder, &descriptor.uniforms);
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(program.label()),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: output.view(),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.options.clear()),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_viewport(0.0, 0.0, viewport.0 as f32, viewport.1 as f32, 0.0, 1.0);
                program.draw(&mut pass, input.bind_group(), self.ctx.quad());
            }
            tracing::trace!(
                pass = step.index,
                program = program.label(),
                input = ?input.id(),
                output = ?output.id(),
                "recorded pass"
            );

            records.push(PassRecord {
                program: program.label().to_string(),
                input: input.id(),
                target: step.target,
                output: output.id(),
                viewport,
                uniforms: staged.outcomes().to_vec(),
            });
        }

        self.ctx.queue().submit(Some(encoder.finish()));
        Ok(records)
    }

    fn notify(&mut self) {
        let (width, height) = self.ctx.surface_size();
        let ready = FrameReady {
            serial: self.serial,
            width,
            height,
        };
        self.subscribers.retain(|subscriber| match subscriber.try_send(ready) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Receives a [`FrameReady`] after each rendered frame.
    ///
    /// Only the oldest unconsumed signal is kept; the compositor never waits
    /// on a slow subscriber.
    pub fn subscribe(&mut self) -> Receiver<FrameReady> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.subscribers.push(sender);
        receiver
    }

    /// Bakes the visible surface into the source image and drops the active
    /// provider, so the result becomes the input for whichever tool is
    /// selected next.
    ///
    /// Fails with [`CompositorError::NoFrame`] until a frame has been rendered
    /// from the current image; the source is left untouched.
    pub fn apply(&mut self) -> Result<(), CompositorError> {
        let source = self.source.as_ref().ok_or(CompositorError::NoImage)?;
        if !self.frame_current {
            return Err(CompositorError::NoFrame);
        }
        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("apply visible surface"),
            });
        self.ctx.canvas().copy_to(&mut encoder, source);
        self.ctx.queue().submit(Some(encoder.finish()));
        if let Some(provider) = self.provider.take().and_then(|weak| weak.upgrade()) {
            tracing::info!(provider = provider.label(), "applied visible surface to source image");
        }
        Ok(())
    }

    /// Reads back the visible surface.
    pub fn snapshot(&self) -> Result<RgbaImage, CompositorError> {
        if self.source.is_none() {
            return Err(CompositorError::NoImage);
        }
        Ok(readback::read_texture(
            self.ctx.device(),
            self.ctx.queue(),
            self.ctx.canvas(),
        )?)
    }

    /// Reads back the source image as currently stored on the GPU.
    pub fn source_snapshot(&self) -> Result<RgbaImage, CompositorError> {
        let source = self.source.as_ref().ok_or(CompositorError::NoImage)?;
        Ok(readback::read_texture(self.ctx.device(), self.ctx.queue(), source)?)
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn options(&self) -> &CompositorOptions {
        &self.options
    }

    pub fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }

    pub fn source(&self) -> Option<&Texture2D> {
        self.source.as_ref()
    }

    pub fn visible_surface(&self) -> &Texture2D {
        self.ctx.canvas()
    }

    pub fn pool(&self) -> &RenderTargetPool {
        &self.pool
    }

    pub fn last_frame(&self) -> Option<&FrameReport> {
        self.last_frame.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_pass_goes_straight_to_screen() {
        assert_eq!(
            plan_chain(1),
            vec![ChainStep {
                index: 0,
                input: ChainInput::Source,
                target: PassTarget::Screen,
            }]
        );
    }

    #[test]
    fn empty_chain_plans_nothing() {
        assert!(plan_chain(0).is_empty());
    }

    #[test]
    fn chains_alternate_between_slots() {
        let steps = plan_chain(5);
        let targets: Vec<PassTarget> = steps.iter().map(|step| step.target).collect();
        assert_eq!(
            targets,
            vec![
                PassTarget::Slot(0),
                PassTarget::Slot(1),
                PassTarget::Slot(0),
                PassTarget::Slot(1),
                PassTarget::Screen,
            ]
        );
        assert_eq!(steps[0].input, ChainInput::Source);
        for window in steps.windows(2) {
            let PassTarget::Slot(previous) = window[0].target else {
                panic!("only the last pass writes the screen");
            };
            assert_eq!(window[1].input, ChainInput::Slot(previous));
        }
    }

    #[test]
    fn only_the_last_pass_targets_the_screen() {
        for len in 1..=8 {
            let steps = plan_chain(len);
            assert_eq!(steps.len(), len);
            let screens = steps
                .iter()
                .filter(|step| step.target == PassTarget::Screen)
                .count();
            assert_eq!(screens, 1);
            assert_eq!(steps[len - 1].target, PassTarget::Screen);
        }
    }

    #[test]
    fn a_pass_never_reads_the_slot_it_writes() {
        for step in plan_chain(6) {
            if let (ChainInput::Slot(input), PassTarget::Slot(output)) = (step.input, step.target) {
                assert_ne!(input, output);
            }
        }
    }
}
