use std::f32::consts::FRAC_PI_2;
use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassProvider, ProgramInfo, ProviderPasses};
use crate::tools::{ParamSet, ParamSpec, Tool, ToolInfo};

const FRAGMENT: &str = r"
layout(std140, set = 1, binding = 0) uniform Params {
    vec2 uFlip;
    vec2 uOffset;
    vec2 uWrap;
    float uRotation;
    float uPixelSnap;
} params;

void main() {
    vec2 size = vec2(textureSize(uSampler, 0));
    vec2 offset = mix(params.uOffset, floor(params.uOffset * size + 0.5) / size, params.uPixelSnap);
    vec2 uv = vTextureCoord + offset;
    uv = params.uFlip * (1.0 - uv) + (1.0 - params.uFlip) * uv;

    vec2 centered = uv - vec2(0.5);
    float cosA = cos(params.uRotation);
    float sinA = sin(params.uRotation);
    uv = vec2(centered.x * cosA - centered.y * sinA, centered.x * sinA + centered.y * cosA) + vec2(0.5);

    uv = params.uWrap * fract(uv) + (vec2(1.0) - params.uWrap) * clamp(uv, 0.0, 1.0);
    fragColor = texture(uSampler, uv);
}
";

const PARAMS: &[ParamSpec] = &[
    ParamSpec::new("rotation", -360.0, 360.0, 0.0),
    ParamSpec::toggle("flip_x", false),
    ParamSpec::toggle("flip_y", false),
    ParamSpec::new("offset_x", -1.0, 1.0, 0.0),
    ParamSpec::new("offset_y", -1.0, 1.0, 0.0),
    ParamSpec::toggle("wrap_x", true),
    ParamSpec::toggle("wrap_y", true),
    ParamSpec::toggle("pixel_snap", true),
];

/// Quarter-turn rotation, flips and a wrapping offset.
pub struct Transform {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Transform {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Transform",
        aliases: &["Translate", "Offset", "Rotate"],
        description: "Offset and Rotate the image",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "transform", FRAGMENT)?,
            params: ParamSet::new(PARAMS),
        })
    }
}

/// Rotation in radians, snapped to the nearest quarter turn.
fn quarter_turn_radians(degrees: f32) -> f32 {
    (degrees / 90.0).round() * FRAC_PI_2
}

fn flag(params: &ParamSet, name: &str) -> f32 {
    if params.flag(name) {
        1.0
    } else {
        0.0
    }
}

fn transform_uniforms(params: &ParamSet) -> Uniforms {
    Uniforms::new()
        .with("uFlip", [flag(params, "flip_x"), flag(params, "flip_y")])
        .with(
            "uOffset",
            [-params.value("offset_x"), params.value("offset_y")],
        )
        .with("uWrap", [flag(params, "wrap_x"), flag(params, "wrap_y")])
        .with("uRotation", quarter_turn_radians(params.value("rotation")))
        .with("uPixelSnap", flag(params, "pixel_snap"))
}

impl PassProvider for Transform {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, transform_uniforms(&self.params)))
    }
}

impl Tool for Transform {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}
