//! The boundary between the compositor and the effects it runs.
//!
//! A [`PassProvider`] is queried afresh on every frame. It answers with one of
//! two explicitly tagged shapes:
//!
//! - [`ProviderPasses::Simple`]: one program sampling the source image and
//!   writing the visible surface.
//! - [`ProviderPasses::Chained`]: an ordered, non-empty list of passes that the
//!   compositor ping-pongs through its render target pool, with the last pass
//!   always landing on the visible surface.
//!
//! Providers are borrowed, never owned, by the compositor. Values inside a
//! descriptor may change between frames; nothing is cached across calls.

use crate::gpu::program::{AttributeLocations, ShaderProgram};
use crate::gpu::uniforms::{UniformLayout, Uniforms};

/// Where a pass would like its output to go.
///
/// Advisory only: the compositor routes every pass but the last to a pool
/// slot and the last one to the visible surface, whatever is requested here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassOutput {
    #[default]
    Screen,
    Slot(usize),
}

/// One program and the values to draw it with.
#[derive(Debug, Clone)]
pub struct ProgramInfo<'a> {
    pub program: &'a ShaderProgram,
    pub uniforms: Uniforms,
}

impl<'a> ProgramInfo<'a> {
    pub fn new(program: &'a ShaderProgram, uniforms: Uniforms) -> Self {
        Self { program, uniforms }
    }

    pub fn attribute_locations(&self) -> AttributeLocations {
        self.program.attribute_locations()
    }

    pub fn uniform_locations(&self) -> &UniformLayout {
        self.program.uniform_locations()
    }
}

/// Description of one draw in a chain.
#[derive(Debug, Clone)]
pub struct PassDescriptor<'a> {
    pub program: &'a ShaderProgram,
    pub uniforms: Uniforms,
    pub output: PassOutput,
}

impl<'a> PassDescriptor<'a> {
    pub fn new(program: &'a ShaderProgram, uniforms: Uniforms) -> Self {
        Self {
            program,
            uniforms,
            output: PassOutput::default(),
        }
    }

    pub fn with_output(mut self, output: PassOutput) -> Self {
        self.output = output;
        self
    }
}

impl<'a> From<ProgramInfo<'a>> for PassDescriptor<'a> {
    fn from(info: ProgramInfo<'a>) -> Self {
        PassDescriptor::new(info.program, info.uniforms)
    }
}

/// The two shapes a provider can report for a frame.
#[derive(Debug, Clone)]
pub enum ProviderPasses<'a> {
    Simple(ProgramInfo<'a>),
    Chained(Vec<PassDescriptor<'a>>),
}

impl<'a> ProviderPasses<'a> {
    pub fn is_chained(&self) -> bool {
        matches!(self, ProviderPasses::Chained(_))
    }

    /// Flattens either shape into the list of draws to execute.
    pub(crate) fn into_descriptors(self) -> Vec<PassDescriptor<'a>> {
        match self {
            ProviderPasses::Simple(info) => vec![info.into()],
            ProviderPasses::Chained(passes) => passes,
        }
    }
}

/// An effect the compositor can run.
pub trait PassProvider {
    /// Human-readable name used in diagnostics and frame reports.
    fn label(&self) -> &str;

    /// The passes for the current frame, reflecting current parameter state.
    fn passes(&self) -> ProviderPasses<'_>;
}
