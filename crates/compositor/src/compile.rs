use std::collections::BTreeSet;
use std::fmt;

use wgpu::naga;

use crate::gpu::uniforms::{UniformLayout, UniformSlot};

/// Descriptor set holding the per-program uniform block.
pub(crate) const UNIFORM_GROUP: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStageKind {
    Vertex,
    Fragment,
}

impl ShaderStageKind {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            ShaderStageKind::Vertex => naga::ShaderStage::Vertex,
            ShaderStageKind::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStageKind::Vertex => f.write_str("vertex"),
            ShaderStageKind::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{program}: {stage} shader failed to compile:\n{log}")]
    Compile {
        program: String,
        stage: ShaderStageKind,
        log: String,
    },
    #[error("{program}: program failed to link:\n{log}")]
    Link { program: String, log: String },
}

/// Interface of one validated stage, as seen by the link step.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct StageInterface {
    pub inputs: BTreeSet<u32>,
    pub outputs: BTreeSet<u32>,
    pub block: Option<UniformLayout>,
}

/// A stage that parsed and validated; `source` is what gets handed to wgpu.
#[derive(Debug)]
pub(crate) struct CompiledStage {
    pub stage: ShaderStageKind,
    pub source: String,
    pub interface: StageInterface,
}

/// Parses and validates one GLSL stage, then reflects its interface.
pub(crate) fn compile_stage(
    program: &str,
    stage: ShaderStageKind,
    source: String,
) -> Result<CompiledStage, ShaderError> {
    let compile_error = |log: String| ShaderError::Compile {
        program: program.to_string(),
        stage,
        log,
    };

    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, &source)
        .map_err(|errors| compile_error(errors.emit_to_string(&source)))?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|error| compile_error(error.emit_to_string(&source)))?;

    let interface = reflect_interface(&module, stage).map_err(compile_error)?;
    Ok(CompiledStage {
        stage,
        source,
        interface,
    })
}

/// Checks that a vertex and a fragment stage can be used together and returns
/// the program's uniform block layout.
pub(crate) fn link_stages(
    program: &str,
    vertex: &StageInterface,
    fragment: &StageInterface,
) -> Result<UniformLayout, ShaderError> {
    let link_error = |log: String| ShaderError::Link {
        program: program.to_string(),
        log,
    };

    if !vertex.inputs.contains(&0) {
        return Err(link_error(
            "vertex stage does not read the vertex position at location 0".to_string(),
        ));
    }
    if let Some(unknown) = vertex.inputs.iter().find(|location| **location > 1) {
        return Err(link_error(format!(
            "vertex stage reads attribute location {unknown}; only 0 (position) and 1 (texture coordinate) are bound"
        )));
    }

    let unwritten: Vec<String> = fragment
        .inputs
        .difference(&vertex.outputs)
        .map(u32::to_string)
        .collect();
    if !unwritten.is_empty() {
        return Err(link_error(format!(
            "fragment stage reads location(s) {} that the vertex stage never writes",
            unwritten.join(", ")
        )));
    }

    match (&vertex.block, &fragment.block) {
        (Some(vertex_block), Some(fragment_block)) if vertex_block != fragment_block => {
            Err(link_error(
                "vertex and fragment stages declare different uniform blocks".to_string(),
            ))
        }
        (_, Some(block)) | (Some(block), None) => Ok(block.clone()),
        (None, None) => Ok(UniformLayout::empty()),
    }
}

/// Produces a complete fragment shader from a pass body.
///
/// Pass bodies are written against a small fixed environment: the varying
/// `vTextureCoord`, the output `fragColor` and the input image as `uSampler`.
/// Any `#version`, `precision` or matching declarations in the body are
/// dropped so the prelude's definitions win.
pub(crate) fn wrap_fragment(source: &str) -> String {
    let mut body = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        let redundant = trimmed.starts_with("#version")
            || trimmed.starts_with("precision ")
            || (trimmed.starts_with("uniform ") && trimmed.contains("uSampler"))
            || ((trimmed.starts_with("varying ") || trimmed.starts_with("in "))
                && trimmed.contains("vTextureCoord"))
            || (trimmed.starts_with("out ") && trimmed.contains("fragColor"));
        if redundant {
            continue;
        }
        body.push_str(line);
        body.push('\n');
    }
    format!("{FRAGMENT_PRELUDE}\n#line 1\n{body}")
}

const FRAGMENT_PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 vTextureCoord;
layout(location = 0) out vec4 fragColor;

layout(set = 0, binding = 0) uniform texture2D compositor_input_texture;
layout(set = 0, binding = 1) uniform sampler compositor_input_sampler;
#define uSampler sampler2D(compositor_input_texture, compositor_input_sampler)
";

fn reflect_interface(
    module: &naga::Module,
    stage: ShaderStageKind,
) -> Result<StageInterface, String> {
    let entry = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == stage.to_naga())
        .ok_or_else(|| format!("no {stage} entry point"))?;

    let mut interface = StageInterface::default();
    for argument in &entry.function.arguments {
        collect_locations(module, argument.ty, argument.binding.as_ref(), &mut interface.inputs);
    }
    if let Some(result) = &entry.function.result {
        collect_locations(module, result.ty, result.binding.as_ref(), &mut interface.outputs);
    }
    interface.block = reflect_uniform_block(module)?;
    Ok(interface)
}

fn collect_locations(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    binding: Option<&naga::Binding>,
    into: &mut BTreeSet<u32>,
) {
    match binding {
        Some(naga::Binding::Location { location, .. }) => {
            into.insert(*location);
        }
        Some(naga::Binding::BuiltIn(_)) => {}
        None => {
            if let naga::TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.ty, member.binding.as_ref(), into);
                }
            }
        }
    }
}

fn reflect_uniform_block(module: &naga::Module) -> Result<Option<UniformLayout>, String> {
    let Some((_, global)) = module.global_variables.iter().find(|(_, global)| {
        global.space == naga::AddressSpace::Uniform
            && global
                .binding
                .as_ref()
                .is_some_and(|binding| binding.group == UNIFORM_GROUP && binding.binding == 0)
    }) else {
        return Ok(None);
    };

    let naga::TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
        return Err("uniform block at set 1, binding 0 is not a block".to_string());
    };

    let mut slots = Vec::with_capacity(members.len());
    for member in members {
        let Some(name) = member.name.clone() else {
            continue;
        };
        let components = match module.types[member.ty].inner {
            naga::TypeInner::Scalar(naga::Scalar {
                kind: naga::ScalarKind::Float,
                width: 4,
            }) => 1,
            naga::TypeInner::Vector {
                size,
                scalar:
                    naga::Scalar {
                        kind: naga::ScalarKind::Float,
                        width: 4,
                    },
            } => size as u32,
            _ => {
                return Err(format!(
                    "uniform `{name}` must be a float or a float vector"
                ))
            }
        };
        slots.push(UniformSlot {
            name,
            offset: member.offset,
            components,
        });
    }
    Ok(Some(UniformLayout::new(slots, *span)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r"#version 450
layout(location = 0) in vec2 aVertexPosition;
layout(location = 1) in vec2 aTextureCoord;
layout(location = 0) out vec2 vTextureCoord;
void main() {
    vTextureCoord = aTextureCoord;
    gl_Position = vec4(aVertexPosition, 0.0, 1.0);
}
";

    fn vertex() -> StageInterface {
        compile_stage("test", ShaderStageKind::Vertex, VERTEX.to_string())
            .expect("vertex compiles")
            .interface
    }

    fn fragment(body: &str) -> Result<CompiledStage, ShaderError> {
        compile_stage("test", ShaderStageKind::Fragment, wrap_fragment(body))
    }

    #[test]
    fn wrap_drops_webgl_declarations() {
        let wrapped = wrap_fragment(
            "precision mediump float;\nvarying vec2 vTextureCoord;\nuniform sampler2D uSampler;\nvoid main() { fragColor = texture(uSampler, vTextureCoord); }\n",
        );
        assert!(!wrapped.contains("precision mediump"));
        assert!(!wrapped.contains("varying"));
        assert!(!wrapped.contains("uniform sampler2D uSampler"));
        assert!(wrapped.starts_with("#version 450"));
        assert!(wrapped.contains("#line 1\nvoid main()"));
    }

    #[test]
    fn vertex_interface_is_reflected() {
        let interface = vertex();
        assert_eq!(interface.inputs, BTreeSet::from([0, 1]));
        assert_eq!(interface.outputs, BTreeSet::from([0]));
        assert!(interface.block.is_none());
    }

    #[test]
    fn uniform_block_is_reflected_with_std140_offsets() {
        let stage = fragment(
            r"layout(std140, set = 1, binding = 0) uniform Params {
    float uSigma;
    vec2 uDirection;
    vec3 inputLevels;
} params;
void main() {
    fragColor = texture(uSampler, vTextureCoord) * params.uSigma
        + vec4(params.uDirection, params.inputLevels.xy);
}
",
        )
        .expect("fragment compiles");

        let block = stage.interface.block.expect("block reflected");
        let sigma = block.slot("uSigma").expect("uSigma");
        let direction = block.slot("uDirection").expect("uDirection");
        let levels = block.slot("inputLevels").expect("inputLevels");
        assert_eq!((sigma.offset, sigma.components), (0, 1));
        assert_eq!((direction.offset, direction.components), (8, 2));
        assert_eq!((levels.offset, levels.components), (16, 3));
        assert_eq!(block.size(), 32);
    }

    #[test]
    fn syntax_error_reports_stage_and_log() {
        let err = fragment("void main() { fragColor = ; }").expect_err("must fail");
        match err {
            ShaderError::Compile { stage, log, .. } => {
                assert_eq!(stage, ShaderStageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn integer_uniforms_are_rejected() {
        let err = fragment(
            r"layout(std140, set = 1, binding = 0) uniform Params { int uCount; } params;
void main() { fragColor = vec4(float(params.uCount)); }
",
        )
        .expect_err("int uniform rejected");
        assert!(matches!(err, ShaderError::Compile { .. }));
    }

    #[test]
    fn link_requires_written_varyings() {
        let stage = fragment(
            r"layout(location = 3) in vec2 vExtra;
void main() { fragColor = texture(uSampler, vTextureCoord + vExtra); }
",
        )
        .expect("fragment compiles");
        let err = link_stages("test", &vertex(), &stage.interface).expect_err("link fails");
        assert!(matches!(err, ShaderError::Link { ref log, .. } if log.contains('3')));
    }

    #[test]
    fn link_requires_position_attribute() {
        let mut vertex = vertex();
        vertex.inputs.remove(&0);
        let stage = fragment("void main() { fragColor = texture(uSampler, vTextureCoord); }")
            .expect("fragment compiles");
        assert!(link_stages("test", &vertex, &stage.interface).is_err());
    }

    #[test]
    fn link_rejects_mismatched_blocks() {
        let mut vertex = vertex();
        vertex.block = Some(UniformLayout::new(
            vec![UniformSlot {
                name: "uOther".into(),
                offset: 0,
                components: 1,
            }],
            16,
        ));
        let stage = fragment(
            r"layout(std140, set = 1, binding = 0) uniform Params { float uAmount; } params;
void main() { fragColor = texture(uSampler, vTextureCoord) * params.uAmount; }
",
        )
        .expect("fragment compiles");
        assert!(link_stages("test", &vertex, &stage.interface).is_err());
    }

    #[test]
    fn link_without_blocks_yields_empty_layout() {
        let stage = fragment("void main() { fragColor = texture(uSampler, vTextureCoord); }")
            .expect("fragment compiles");
        let layout = link_stages("test", &vertex(), &stage.interface).expect("links");
        assert!(layout.is_empty());
    }
}
