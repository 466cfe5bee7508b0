use wgpu::util::DeviceExt;

use crate::types::ContextOptions;

use super::targets::{RenderTargetPool, TargetPair, Texture2D};

/// Clip-space corners of the full-screen quad, in triangle-strip order.
const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, 1.0], [1.0, 1.0], [-1.0, -1.0], [1.0, -1.0]];

/// Texture coordinates matching [`QUAD_POSITIONS`]; (0, 0) is the first image row.
const QUAD_TEXCOORDS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// No usable graphics device. Startup cannot continue.
    #[error("no graphics device available: {0}")]
    FatalInit(String),
}

/// Adapter details captured at start-up for diagnostics.
#[derive(Debug, Clone)]
pub struct AdapterSummary {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
}

impl AdapterSummary {
    fn from_wgpu(info: &wgpu::AdapterInfo) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

/// Bind group layouts shared by every pass pipeline.
///
/// Group 0 carries the pass input (texture + sampler), group 1 the program's
/// uniform block.
pub(crate) struct BindingLayouts {
    pub input: wgpu::BindGroupLayout,
    pub uniforms: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

impl BindingLayouts {
    fn new(device: &wgpu::Device) -> Self {
        let input = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass input layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pass pipeline layout"),
            bind_group_layouts: &[&input, &uniforms],
            push_constant_ranges: &[],
        });
        Self {
            input,
            uniforms,
            pipeline,
        }
    }
}

/// Static position and texture-coordinate buffers for the full-screen quad.
pub struct QuadBuffers {
    position: wgpu::Buffer,
    texcoord: wgpu::Buffer,
}

impl QuadBuffers {
    pub const VERTEX_COUNT: u32 = 4;

    const ATTRIBUTE_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 2]>() as u64;

    pub(crate) fn new(device: &wgpu::Device, label: &str) -> Self {
        let position = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} quad positions")),
            contents: bytemuck::cast_slice(&QUAD_POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let texcoord = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} quad texcoords")),
            contents: bytemuck::cast_slice(&QUAD_TEXCOORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Self { position, texcoord }
    }

    pub fn position(&self) -> &wgpu::Buffer {
        &self.position
    }

    pub fn texcoord(&self) -> &wgpu::Buffer {
        &self.texcoord
    }

    /// Vertex buffer layouts for attribute locations 0 (position) and 1 (texcoord).
    pub(crate) fn vertex_layouts() -> [wgpu::VertexBufferLayout<'static>; 2] {
        const POSITION: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        const TEXCOORD: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x2];
        [
            wgpu::VertexBufferLayout {
                array_stride: Self::ATTRIBUTE_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &POSITION,
            },
            wgpu::VertexBufferLayout {
                array_stride: Self::ATTRIBUTE_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &TEXCOORD,
            },
        ]
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.position.slice(..));
        pass.set_vertex_buffer(1, self.texcoord.slice(..));
        pass.draw(0..Self::VERTEX_COUNT, 0..1);
    }
}

/// Owns the graphics device, the visible surface and the shared quad.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: AdapterSummary,
    limits: wgpu::Limits,
    layouts: BindingLayouts,
    sampler: wgpu::Sampler,
    quad: QuadBuffers,
    canvas: Texture2D,
}

impl GpuContext {
    pub fn new(options: &ContextOptions) -> Result<Self, ContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power.to_wgpu(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .or_else(|err| {
            if !options.allow_fallback_adapter {
                return Err(err);
            }
            tracing::warn!(error = %err, "no hardware adapter found; trying fallback adapter");
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power.to_wgpu(),
                compatible_surface: None,
                force_fallback_adapter: true,
            }))
        })
        .map_err(|err| ContextError::FatalInit(format!("failed to find a GPU adapter: {err}")))?;

        let summary = AdapterSummary::from_wgpu(&adapter.get_info());
        let limits = adapter.limits();
        tracing::debug!(
            name = %summary.name,
            backend = ?summary.backend,
            device_type = ?summary.device_type,
            max_texture_dimension = limits.max_texture_dimension_2d,
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some(&options.label),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| ContextError::FatalInit(format!("failed to create GPU device: {err}")))?;

        let layouts = BindingLayouts::new(&device);
        let filter = options.filter.to_wgpu();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pass input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let quad = QuadBuffers::new(&device, "compositor");
        let canvas = Texture2D::new(&device, &layouts.input, &sampler, "visible surface", 1, 1);

        Ok(Self {
            device,
            queue,
            adapter: summary,
            limits,
            layouts,
            sampler,
            quad,
            canvas,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter(&self) -> &AdapterSummary {
        &self.adapter
    }

    pub fn quad_position_buffer(&self) -> &wgpu::Buffer {
        self.quad.position()
    }

    pub fn quad_texcoord_buffer(&self) -> &wgpu::Buffer {
        self.quad.texcoord()
    }

    pub(crate) fn quad(&self) -> &QuadBuffers {
        &self.quad
    }

    /// Size of the visible surface in pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        self.canvas.size()
    }

    /// The visible surface: the texture the last pass of every frame writes.
    pub fn canvas(&self) -> &Texture2D {
        &self.canvas
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.limits.max_texture_dimension_2d
    }

    pub(crate) fn layouts(&self) -> &BindingLayouts {
        &self.layouts
    }

    /// Creates an image-sized RGBA8 texture sampled through the shared sampler.
    pub(crate) fn create_texture(&self, label: &str, width: u32, height: u32) -> Texture2D {
        Texture2D::new(
            &self.device,
            &self.layouts.input,
            &self.sampler,
            label,
            width,
            height,
        )
    }

    pub(crate) fn create_target_pair(&self, width: u32, height: u32) -> TargetPair {
        RenderTargetPool::create_pair(&self.device, &self.layouts, &self.sampler, width, height)
    }

    /// Swaps in a new visible surface and destroys the previous one.
    pub(crate) fn install_canvas(&mut self, canvas: Texture2D) {
        let previous = std::mem::replace(&mut self.canvas, canvas);
        tracing::debug!(
            previous = ?previous.id(),
            current = ?self.canvas.id(),
            width = self.canvas.width(),
            height = self.canvas.height(),
            "resized visible surface"
        );
        previous.destroy();
    }

    pub(crate) fn with_error_scope<T>(&self, operation: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
        with_error_scope(&self.device, operation)
    }
}

/// Runs `operation` inside validation and out-of-memory error scopes.
pub(crate) fn with_error_scope<T>(
    device: &wgpu::Device,
    operation: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = operation();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    (value, validation.or(out_of_memory))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_covers_clip_space_as_strip() {
        // Strip triangles (0,1,2) and (2,1,3) must span the full clip square.
        let xs: Vec<f32> = QUAD_POSITIONS.iter().map(|p| p[0]).collect();
        let ys: Vec<f32> = QUAD_POSITIONS.iter().map(|p| p[1]).collect();
        assert_eq!(xs.iter().cloned().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(xs.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        assert_eq!(ys.iter().cloned().fold(f32::MAX, f32::min), -1.0);
        assert_eq!(ys.iter().cloned().fold(f32::MIN, f32::max), 1.0);
        assert_eq!(QUAD_POSITIONS[0], [-1.0, 1.0]);
        assert_eq!(QUAD_POSITIONS[3], [1.0, -1.0]);
    }

    #[test]
    fn texcoords_keep_image_upright() {
        for (position, texcoord) in QUAD_POSITIONS.iter().zip(QUAD_TEXCOORDS.iter()) {
            assert_eq!(texcoord[0], (position[0] + 1.0) * 0.5);
            assert_eq!(texcoord[1], (1.0 - position[1]) * 0.5);
        }
    }
}
