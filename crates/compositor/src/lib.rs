//! Multi-pass GPU compositing pipeline for the image editor.
//!
//! A decoded image is uploaded into a source texture and pushed through the
//! passes reported by whichever tool is active. The overall flow is:
//!
//! ```text
//!   load_image ──▶ source texture + RenderTargetPool (image sized)
//!                          │
//!   set_provider ──▶ render() ──▶ provider.passes()
//!                          │
//!                          ├─ Simple:  source ─▶ canvas
//!                          └─ Chained: source ─▶ slot 0 ─▶ slot 1 ─▶ … ─▶ canvas
//!                                                                   │
//!                                            FrameReady ──▶ PreviewSurface (tiled)
//! ```
//!
//! `GpuContext` owns the device, the shared full-screen quad and the canvas
//! (the visible surface). `Compositor` owns the source texture and the two
//! ping-pong targets and only borrows the active `PassProvider`. Effects live
//! outside the core contract; the built-in ones in [`effects`] are the
//! editor's stock tools and double as reference providers.
//!
//! # Writing a pass
//!
//! A fragment body is GLSL 450 and sees three names: the varying
//! `vTextureCoord`, the output `fragColor`, and the pass input as
//! `uSampler`. Uniforms go in one std140 block at set 1, binding 0, with
//! float or `vec2`..`vec4` members only:
//!
//! ```glsl
//! layout(std140, set = 1, binding = 0) uniform Params {
//!     float uAmount;
//! } params;
//!
//! void main() {
//!     vec4 color = texture(uSampler, vTextureCoord);
//!     fragColor = vec4(color.rgb * params.uAmount, color.a);
//! }
//! ```

mod compile;
pub mod compositor;
pub mod effects;
pub mod gpu;
pub mod preview;
pub mod provider;
pub mod tools;
mod types;

pub use compile::{ShaderError, ShaderStageKind};
pub use compositor::{
    plan_chain, ChainInput, ChainStep, Compositor, CompositorError, FrameOutcome, FrameReady,
    FrameReport, PassRecord, PassTarget, SkipReason,
};
pub use gpu::context::{AdapterSummary, ContextError, GpuContext, QuadBuffers};
pub use gpu::program::{
    AttributeLocations, ProgramCache, ShaderProgram, ATTRIBUTE_LOCATIONS, QUAD_VERTEX_SHADER,
};
pub use gpu::readback::ReadbackError;
pub use gpu::targets::{RenderTarget, RenderTargetPool, Texture2D, TextureId, POOL_SLOTS};
pub use gpu::uniforms::{
    BindOutcome, StagedUniforms, UniformLayout, UniformSlot, UniformValue, Uniforms, UploadOp,
};
pub use preview::{PreviewOptions, PreviewSurface, PreviewVisibility};
pub use provider::{PassDescriptor, PassOutput, PassProvider, ProgramInfo, ProviderPasses};
pub use tools::{
    ParamSet, ParamSpec, RegisteredTool, Tool, ToolError, ToolFailure, ToolInfo, ToolRegistry,
};
pub use types::{CompositorOptions, ContextOptions, PowerPreference, SamplerFilter};
