use std::borrow::Cow;
use std::collections::HashMap;
use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::compile::{self, ShaderError, ShaderStageKind};

use super::context::{GpuContext, QuadBuffers};
use super::targets::TEXTURE_FORMAT;
use super::uniforms::{StagedUniforms, UniformLayout, Uniforms};

/// Standard vertex stage: passes the quad's texture coordinate through.
pub const QUAD_VERTEX_SHADER: &str = r"#version 450
layout(location = 0) in vec2 aVertexPosition;
layout(location = 1) in vec2 aTextureCoord;
layout(location = 0) out vec2 vTextureCoord;

void main() {
    vTextureCoord = aTextureCoord;
    gl_Position = vec4(aVertexPosition, 0.0, 1.0);
}
";

/// Vertex attribute locations every program is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeLocations {
    pub vertex_position: u32,
    pub texture_coord: u32,
}

pub const ATTRIBUTE_LOCATIONS: AttributeLocations = AttributeLocations {
    vertex_position: 0,
    texture_coord: 1,
};

/// A linked vertex + fragment pair. Immutable once created.
pub struct ShaderProgram {
    label: String,
    pipeline: wgpu::RenderPipeline,
    uniforms: UniformLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
}

impl ShaderProgram {
    /// Compiles, links and uploads a program.
    ///
    /// `fragment_src` is a pass body; see the crate docs for the names it may
    /// use. The uniform block, if any, must be declared as
    /// `layout(std140, set = 1, binding = 0) uniform ...`.
    pub fn new(
        ctx: &GpuContext,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Self, ShaderError> {
        let vertex = compile::compile_stage(label, ShaderStageKind::Vertex, vertex_src.to_string())?;
        let fragment = compile::compile_stage(
            label,
            ShaderStageKind::Fragment,
            compile::wrap_fragment(fragment_src),
        )?;
        let uniforms = compile::link_stages(label, &vertex.interface, &fragment.interface)?;

        let device = ctx.device();
        let (pipeline, error) = ctx.with_error_scope(|| {
            let vertex_module = create_module(device, label, &vertex);
            let fragment_module = create_module(device, label, &fragment);
            create_pipeline(ctx, label, &vertex_module, &fragment_module)
        });
        if let Some(error) = error {
            return Err(ShaderError::Link {
                program: label.to_string(),
                log: error.to_string(),
            });
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} uniforms")),
            size: uniforms.buffer_size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} uniforms")),
            layout: &ctx.layouts().uniforms,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        tracing::debug!(
            program = label,
            uniforms = uniforms.slots().len(),
            block_size = uniforms.size(),
            "linked shader program"
        );

        Ok(Self {
            label: label.to_string(),
            pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn attribute_locations(&self) -> AttributeLocations {
        ATTRIBUTE_LOCATIONS
    }

    pub fn uniform_locations(&self) -> &UniformLayout {
        &self.uniforms
    }

    /// Stages `uniforms` for the next pass recorded on `encoder`.
    ///
    /// The block goes through its own transient buffer, so recording the same
    /// program twice in one encoder keeps each pass's values.
    pub(crate) fn stage_uniforms(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &Uniforms,
    ) -> StagedUniforms {
        let staged = self.uniforms.stage(uniforms);
        let staging = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform staging"),
            contents: staged.bytes(),
            usage: wgpu::BufferUsages::COPY_SRC,
        });
        encoder.copy_buffer_to_buffer(&staging, 0, &self.uniform_buffer, 0, self.uniforms.buffer_size());
        staged
    }

    /// Binds this program's pipeline and uniforms, samples `input`, draws the quad.
    pub(crate) fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        input: &wgpu::BindGroup,
        quad: &QuadBuffers,
    ) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, input, &[]);
        pass.set_bind_group(compile::UNIFORM_GROUP, &self.uniform_bind_group, &[]);
        quad.draw(pass);
    }
}

impl std::fmt::Debug for ShaderProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderProgram")
            .field("label", &self.label)
            .field("uniforms", &self.uniforms)
            .finish()
    }
}

fn create_module(
    device: &wgpu::Device,
    label: &str,
    stage: &compile::CompiledStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{label} {}", stage.stage)),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(stage.source.as_str()),
            stage: stage.stage.to_naga(),
            defines: &[],
        },
    })
}

fn create_pipeline(
    ctx: &GpuContext,
    label: &str,
    vertex: &wgpu::ShaderModule,
    fragment: &wgpu::ShaderModule,
) -> wgpu::RenderPipeline {
    let buffers = QuadBuffers::vertex_layouts();
    ctx.device()
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&ctx.layouts().pipeline),
            vertex: wgpu::VertexState {
                module: vertex,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
}

/// Programs memoised by their source pair.
///
/// Tools that share a shader share one program. Failed compiles are not
/// cached; every attempt reports its own diagnostic.
#[derive(Debug, Default)]
pub struct ProgramCache {
    programs: HashMap<(String, String), Rc<ShaderProgram>>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &mut self,
        ctx: &GpuContext,
        label: &str,
        vertex_src: &str,
        fragment_src: &str,
    ) -> Result<Rc<ShaderProgram>, ShaderError> {
        let key = (vertex_src.to_string(), fragment_src.to_string());
        if let Some(program) = self.programs.get(&key) {
            tracing::trace!(program = label, shared_with = program.label(), "program cache hit");
            return Ok(Rc::clone(program));
        }
        let program = Rc::new(ShaderProgram::new(ctx, label, vertex_src, fragment_src)?);
        self.programs.insert(key, Rc::clone(&program));
        Ok(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}
