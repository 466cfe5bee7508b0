use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassProvider, ProgramInfo, ProviderPasses};
use crate::tools::{ParamSet, Tool, ToolInfo};

const FRAGMENT: &str = r"
void main() {
    vec4 color = texture(uSampler, vTextureCoord);
    fragColor = vec4(1.0 - color.rgb, color.a);
}
";

pub struct Invert {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Invert {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Invert",
        aliases: &["Flip"],
        description: "Black becomes white, white becomes black, etc",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "invert", FRAGMENT)?,
            params: ParamSet::new(&[]),
        })
    }
}

impl PassProvider for Invert {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, Uniforms::new()))
    }
}

impl Tool for Invert {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}
