use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassProvider, ProgramInfo, ProviderPasses};
use crate::tools::{ParamSet, ParamSpec, Tool, ToolInfo};

const FRAGMENT: &str = r"
layout(std140, set = 1, binding = 0) uniform Params {
    vec3 inputLevels;
    vec2 outputLevels;
} params;

float adjustLevels(float value) {
    float range = max(params.inputLevels.z - params.inputLevels.x, 0.00001);
    float normalized = (value - params.inputLevels.x) / range;
    float gamma = log(0.5) / log(params.inputLevels.y);
    float adjusted = pow(max(0.0, normalized), gamma);
    return mix(params.outputLevels.x, params.outputLevels.y, adjusted);
}

void main() {
    vec4 color = texture(uSampler, vTextureCoord);
    fragColor = vec4(adjustLevels(color.r), adjustLevels(color.g), adjustLevels(color.b), color.a);
}
";

// Grey stays strictly inside (0, 1) so the gamma exponent is finite.
const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("black", 0.0, 1.0, 0.0),
    ParamSpec::new("grey", 0.01, 0.99, 0.5),
    ParamSpec::new("white", 0.0, 1.0, 1.0),
    ParamSpec::new("black_output", 0.0, 1.0, 0.0),
    ParamSpec::new("white_output", 0.0, 1.0, 1.0),
];

/// Input black/grey/white points remapped onto an output range.
pub struct Levels {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Levels {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Levels",
        aliases: &["Gamma"],
        description: "Adjust black, grey and white points",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "levels", FRAGMENT)?,
            params: ParamSet::new(PARAMS),
        })
    }
}

fn levels_uniforms(params: &ParamSet) -> Uniforms {
    Uniforms::new()
        .with(
            "inputLevels",
            [params.value("black"), params.value("grey"), params.value("white")],
        )
        .with(
            "outputLevels",
            [params.value("black_output"), params.value("white_output")],
        )
}

impl PassProvider for Levels {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, levels_uniforms(&self.params)))
    }
}

impl Tool for Levels {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}
