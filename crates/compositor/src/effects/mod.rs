//! The editor's stock tools.
//!
//! Each effect owns its programs (shared through the [`ProgramCache`]) and a
//! [`ParamSet`](crate::tools::ParamSet), and reports its passes from current
//! parameter values on every call. Uniform values are built by free functions
//! over the parameter set so they can be checked without a device.

mod blur;
mod invert;
mod levels;
mod noise;
mod passthrough;
mod transform;

use std::rc::Rc;

pub use blur::Blur;
pub use invert::Invert;
pub use levels::Levels;
pub use noise::Noise;
pub use passthrough::Passthrough;
pub use transform::Transform;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram, QUAD_VERTEX_SHADER};

fn quad_program(
    ctx: &GpuContext,
    cache: &mut ProgramCache,
    label: &str,
    fragment: &str,
) -> Result<Rc<ShaderProgram>, ShaderError> {
    cache.get_or_compile(ctx, label, QUAD_VERTEX_SHADER, fragment)
}
