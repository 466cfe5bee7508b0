use std::sync::atomic::{AtomicU64, Ordering};

use super::context::{BindingLayouts, GpuContext};

/// Number of ping-pong slots in a [`RenderTargetPool`].
pub const POOL_SLOTS: usize = 2;

pub(crate) const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Texture2D`]; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    fn next() -> Self {
        TextureId(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An RGBA8 texture together with the bind group that samples it.
pub struct Texture2D {
    id: TextureId,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl Texture2D {
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            id: TextureId::next(),
            texture,
            view,
            bind_group,
            width,
            height,
        }
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub(crate) fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub(crate) fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    /// Replaces the whole texture with tightly packed RGBA8 rows.
    pub(crate) fn write_rgba(&self, queue: &wgpu::Queue, pixels: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
    }

    /// Records a full copy of `self` into `destination`; sizes must match.
    pub(crate) fn copy_to(&self, encoder: &mut wgpu::CommandEncoder, destination: &Texture2D) {
        encoder.copy_texture_to_texture(
            self.texture.as_image_copy(),
            destination.texture.as_image_copy(),
            self.extent(),
        );
    }

    /// Frees the GPU allocation now rather than when the last handle drops.
    pub(crate) fn destroy(self) {
        self.texture.destroy();
    }
}

impl std::fmt::Debug for Texture2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture2D")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A texture bound as a colour attachment.
#[derive(Debug)]
pub struct RenderTarget {
    texture: Texture2D,
}

impl RenderTarget {
    pub fn texture(&self) -> &Texture2D {
        &self.texture
    }
}

/// Two same-sized off-screen targets addressed as slot 0 and slot 1.
///
/// Either both slots exist or neither does.
#[derive(Debug, Default)]
pub struct RenderTargetPool {
    slots: Option<[RenderTarget; POOL_SLOTS]>,
}

#[derive(Debug)]
pub(crate) struct TargetPair([RenderTarget; POOL_SLOTS]);

impl RenderTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a replacement pair without touching the installed one.
    pub(crate) fn create_pair(
        device: &wgpu::Device,
        layouts: &BindingLayouts,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
    ) -> TargetPair {
        let make = |slot: usize| RenderTarget {
            texture: Texture2D::new(
                device,
                &layouts.input,
                sampler,
                &format!("render target slot {slot}"),
                width,
                height,
            ),
        };
        TargetPair([make(0), make(1)])
    }

    /// Releases any current pair, then allocates a new one at the given size.
    pub fn allocate(
        &mut self,
        ctx: &GpuContext,
        width: u32,
        height: u32,
    ) -> Result<(), wgpu::Error> {
        self.release();
        let (pair, error) = ctx.with_error_scope(|| ctx.create_target_pair(width, height));
        if let Some(error) = error {
            pair.destroy();
            return Err(error);
        }
        self.install(pair);
        Ok(())
    }

    /// Replaces both slots at a new size.
    ///
    /// The replacement is created before the current pair is released, so a
    /// failed allocation leaves the pool exactly as it was.
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) -> Result<(), wgpu::Error> {
        let (pair, error) = ctx.with_error_scope(|| ctx.create_target_pair(width, height));
        if let Some(error) = error {
            pair.destroy();
            return Err(error);
        }
        self.install(pair);
        Ok(())
    }

    pub(crate) fn install(&mut self, pair: TargetPair) {
        self.release();
        let TargetPair(slots) = pair;
        tracing::debug!(
            slot0 = ?slots[0].texture.id(),
            slot1 = ?slots[1].texture.id(),
            width = slots[0].texture.width(),
            height = slots[0].texture.height(),
            "allocated render target pair"
        );
        self.slots = Some(slots);
    }

    /// Destroys both slots, if any.
    pub fn release(&mut self) {
        if let Some(slots) = self.slots.take() {
            tracing::debug!(
                slot0 = ?slots[0].texture.id(),
                slot1 = ?slots[1].texture.id(),
                "released render target pair"
            );
            TargetPair(slots).destroy();
        }
    }

    pub fn slot(&self, index: usize) -> Option<&RenderTarget> {
        self.slots.as_ref().and_then(|slots| slots.get(index))
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.slots
            .as_ref()
            .map(|slots| slots[0].texture.size())
    }

    pub fn texture_ids(&self) -> Option<[TextureId; POOL_SLOTS]> {
        self.slots
            .as_ref()
            .map(|slots| [slots[0].texture.id(), slots[1].texture.id()])
    }
}

impl TargetPair {
    pub(crate) fn destroy(self) {
        let TargetPair([first, second]) = self;
        first.texture.destroy();
        second.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_ids_are_unique() {
        let first = TextureId::next();
        let second = TextureId::next();
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[test]
    fn empty_pool_reports_nothing() {
        let mut pool = RenderTargetPool::new();
        assert!(!pool.is_allocated());
        assert!(pool.slot(0).is_none());
        assert!(pool.dimensions().is_none());
        assert!(pool.texture_ids().is_none());
        pool.release();
        assert!(!pool.is_allocated());
    }
}
