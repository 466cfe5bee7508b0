use std::rc::Rc;

use crate::compile::ShaderError;
use crate::gpu::context::GpuContext;
use crate::gpu::program::{ProgramCache, ShaderProgram};
use crate::gpu::uniforms::Uniforms;
use crate::provider::{PassDescriptor, PassOutput, PassProvider, ProviderPasses};
use crate::tools::{ParamSet, ParamSpec, Tool, ToolInfo};

/// Taps per direction; odd so the kernel is centred on the output texel.
#[cfg(test)]
const KERNEL_SIZE: usize = 15;

// The kernel is evaluated and normalised per texel, so the uniform block only
// carries sigma and the sampling axis.
const FRAGMENT: &str = r"
layout(std140, set = 1, binding = 0) uniform Params {
    vec2 uDirection;
    float uSigma;
} params;

const int KERNEL_SIZE = 15;

void main() {
    vec2 texel = params.uDirection / vec2(textureSize(uSampler, 0));
    float sigma = max(params.uSigma, 0.0001);
    float center = float(KERNEL_SIZE / 2);
    vec4 sum = vec4(0.0);
    float total = 0.0;
    for (int i = 0; i < KERNEL_SIZE; i++) {
        float x = float(i) - center;
        float weight = exp(-(x * x) / (2.0 * sigma * sigma));
        sum += texture(uSampler, vTextureCoord + x * texel) * weight;
        total += weight;
    }
    fragColor = sum / total;
}
";

const PARAMS: &[ParamSpec] = &[ParamSpec::new("sigma", 0.0, 40.0, 4.0)];

const HORIZONTAL: [f32; 2] = [1.0, 0.0];
const VERTICAL: [f32; 2] = [0.0, 1.0];

/// Separable Gaussian blur: a horizontal pass into a pool slot, then a
/// vertical pass onto the screen.
pub struct Blur {
    program: Rc<ShaderProgram>,
    params: ParamSet,
}

impl Blur {
    pub const INFO: ToolInfo = ToolInfo {
        name: "Blur",
        aliases: &["Gaussian Blur", "Gaussian"],
        description: "Soften the image with a gaussian kernel",
    };

    pub fn new(ctx: &GpuContext, cache: &mut ProgramCache) -> Result<Self, ShaderError> {
        Ok(Self {
            program: super::quad_program(ctx, cache, "gaussian blur", FRAGMENT)?,
            params: ParamSet::new(PARAMS),
        })
    }
}

fn pass_uniforms(params: &ParamSet, direction: [f32; 2]) -> Uniforms {
    Uniforms::new()
        .with("uSigma", params.value("sigma"))
        .with("uDirection", direction)
}

impl PassProvider for Blur {
    fn label(&self) -> &str {
        Self::INFO.name
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Chained(vec![
            PassDescriptor::new(&self.program, pass_uniforms(&self.params, HORIZONTAL))
                .with_output(PassOutput::Slot(0)),
            PassDescriptor::new(&self.program, pass_uniforms(&self.params, VERTICAL))
                .with_output(PassOutput::Screen),
        ])
    }
}

impl Tool for Blur {
    fn info(&self) -> &ToolInfo {
        &Self::INFO
    }

    fn params(&self) -> &ParamSet {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::uniforms::UniformValue;

    #[test]
    fn shader_kernel_matches_tap_count() {
        assert!(FRAGMENT.contains(&format!("const int KERNEL_SIZE = {KERNEL_SIZE};")));
        assert_eq!(KERNEL_SIZE % 2, 1);
    }

    #[test]
    fn passes_share_sigma_and_differ_in_direction() {
        let params = ParamSet::new(PARAMS);
        params.set("blur", "sigma", 9.5).unwrap();
        let horizontal = pass_uniforms(&params, HORIZONTAL);
        let vertical = pass_uniforms(&params, VERTICAL);
        assert_eq!(horizontal.get("uSigma"), Some(&UniformValue::Scalar(9.5)));
        assert_eq!(vertical.get("uSigma"), Some(&UniformValue::Scalar(9.5)));
        assert_eq!(
            horizontal.get("uDirection"),
            Some(&UniformValue::Vector(vec![1.0, 0.0]))
        );
        assert_eq!(
            vertical.get("uDirection"),
            Some(&UniformValue::Vector(vec![0.0, 1.0]))
        );
    }

    #[test]
    fn sigma_is_limited_to_slider_range() {
        let params = ParamSet::new(PARAMS);
        assert_eq!(params.value("sigma"), 4.0);
        assert_eq!(params.set("blur", "sigma", 80.0).unwrap(), 40.0);
    }
}
