use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassProvider, ProgramInfo, ProviderPasses};
use crate::tools::{ParamSet, ParamSpec, Tool, ToolInfo};

const FRAGMENT: &str = r"
layout(std140, set = 1, binding = 0) uniform Params {
    float uTiling;
    float uEnableTiling;
    float uSeed;
    float uBlendStrength;
} params;

float rnd(vec3 pos) {
    return fract(sin(dot(pos, vec3(64.25375463, 23.27536534, 86.29678483))) * 59482.7542);
}

float random(vec2 cell) {
    vec2 wrapped = mix(cell, mod(cell, params.uTiling), step(0.5, params.uEnableTiling));
    return rnd(vec3(wrapped, params.uSeed));
}

float noise(vec2 st) {
    vec2 i = floor(st);
    vec2 f = fract(st);
    float a = random(i);
    float b = random(i + vec2(1.0, 0.0));
    float c = random(i + vec2(0.0, 1.0));
    float d = random(i + vec2(1.0, 1.0));
    vec2 u = f * f * (3.0 - 2.0 * f);
    return mix(a, b, u.x) + (c - a) * u.y * (1.0 - u.x) + (d - b) * u.x * u.y;
}

void main() {
    float n = noise(vTextureCoord * params.uTiling);
    vec4 color = texture(uSampler, vTextureCoord);
    fragColor = mix(color, vec4(n, n, n, 1.0), params.uBlendStrength);
}
";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("tiling", 2.0, 64.0, 5.0),
    ParamSpec::toggle("enable_tiling", true),
    ParamSpec::new("seed", 0.0, 100.0, 0.0),
    ParamSpec::new("blend", 0.0, 1.0, 1.0),
];

/// Tileable value noise blended over the image.
pub struct Noise {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Noise {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Noise",
        aliases: &["Gaussian Noise", "Perlin Noise", "Simplex Noise"],
        description: "Generate noise pattern",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "noise", FRAGMENT)?,
            params: ParamSet::new(PARAMS),
        })
    }
}

fn noise_uniforms(params: &ParamSet) -> Uniforms {
    let enable_tiling = if params.flag("enable_tiling") { 1.0 } else { 0.0 };
    Uniforms::new()
        .with("uTiling", params.value("tiling").round())
        .with("uEnableTiling", enable_tiling)
        .with("uSeed", params.value("seed"))
        .with("uBlendStrength", params.value("blend"))
}

impl PassProvider for Noise {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, noise_uniforms(&self.params)))
    }
}

impl Tool for Noise {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}
