use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassProvider, ProgramInfo, ProviderPasses};
use crate::tools::{ParamSet, Tool, ToolInfo};

const FRAGMENT: &str = r"
void main() {
    fragColor = texture(uSampler, vTextureCoord);
}
";

/// Shows the image unchanged.
pub struct Passthrough {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Passthrough {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Preview",
        aliases: &["None", "Passthrough"],
        description: "Just see the image",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "preview", FRAGMENT)?,
            params: ParamSet::new(&[]),
        })
    }
}

impl PassProvider for Passthrough {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, Uniforms::new()))
    }
}

impl Tool for Passthrough {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}
