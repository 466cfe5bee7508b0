//! Tool metadata, adjustable parameters and the registry of built-in tools.

use std::cell::Cell;
use std::rc::Rc;

use crate::compile::ShaderError;
use crate::effects::{Blur, Invert, Levels, Noise, Passthrough, Transform};
use crate::gpu::context::GpuContext;
use crate::gpu::program::ProgramCache;
use crate::provider::PassProvider;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("tool '{tool}' has no parameter '{name}'")]
    UnknownParameter { tool: String, name: String },
    #[error("parameter '{name}' cannot be set to {value}")]
    InvalidValue { name: String, value: f32 },
    #[error("tool '{tool}' is unavailable: {reason}")]
    Unavailable { tool: String, reason: String },
}

/// Name, search aliases and a one-line description of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

impl ToolInfo {
    /// Case-insensitive match against the name and every alias. Spaces,
    /// dashes and underscores are interchangeable.
    pub fn matches(&self, query: &str) -> bool {
        let query = normalize(query);
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .any(|candidate| normalize(candidate) == query)
    }
}

fn normalize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '-' | '_' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Range and default of one adjustable parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamSpec {
    pub const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    /// An on/off switch stored as 0.0 or 1.0.
    pub const fn toggle(name: &'static str, default: bool) -> Self {
        Self::new(name, 0.0, 1.0, if default { 1.0 } else { 0.0 })
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Current values of a tool's parameters.
///
/// Values sit in `Cell`s so a tool shared through `Rc` can be adjusted
/// between frames; the next `passes()` call sees the new values.
#[derive(Debug)]
pub struct ParamSet {
    specs: &'static [ParamSpec],
    values: Vec<Cell<f32>>,
}

impl ParamSet {
    pub fn new(specs: &'static [ParamSpec]) -> Self {
        Self {
            specs,
            values: specs.iter().map(|spec| Cell::new(spec.default)).collect(),
        }
    }

    pub fn specs(&self) -> &'static [ParamSpec] {
        self.specs
    }

    fn index(&self, name: &str) -> Option<usize> {
        self.specs
            .iter()
            .position(|spec| spec.name.eq_ignore_ascii_case(name))
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.index(name).map(|index| self.values[index].get())
    }

    /// Current value of `name`; names the tool does not declare read as zero.
    pub fn value(&self, name: &str) -> f32 {
        self.get(name).unwrap_or_default()
    }

    pub fn flag(&self, name: &str) -> bool {
        self.value(name) >= 0.5
    }

    /// Stores `value` clamped into the parameter's range and returns what was stored.
    pub fn set(&self, tool: &str, name: &str, value: f32) -> Result<f32, ToolError> {
        let index = self.index(name).ok_or_else(|| ToolError::UnknownParameter {
            tool: tool.to_string(),
            name: name.to_string(),
        })?;
        if value.is_nan() {
            return Err(ToolError::InvalidValue {
                name: name.to_string(),
                value,
            });
        }
        let clamped = self.specs[index].clamp(value);
        self.values[index].set(clamped);
        Ok(clamped)
    }

    pub fn reset(&self) {
        for (spec, value) in self.specs.iter().zip(&self.values) {
            value.set(spec.default);
        }
    }
}

/// A user-selectable effect: a pass provider with metadata and parameters.
pub trait Tool: PassProvider {
    fn info(&self) -> &ToolInfo;

    fn params(&self) -> &ParamSet;

    fn parameters(&self) -> &[ParamSpec] {
        self.params().specs()
    }

    fn parameter(&self, name: &str) -> Option<f32> {
        self.params().get(name)
    }

    fn set_parameter(&self, name: &str, value: f32) -> Result<f32, ToolError> {
        let stored = self.params().set(self.info().name, name, value)?;
        tracing::trace!(tool = self.info().name, parameter = name, value = stored, "parameter changed");
        Ok(stored)
    }

    fn reset(&self) {
        self.params().reset();
    }
}

/// A registered tool, reachable both as a [`Tool`] and as the
/// [`PassProvider`] handed to the compositor. Both point at one allocation.
#[derive(Clone)]
pub struct RegisteredTool {
    tool: Rc<dyn Tool>,
    provider: Rc<dyn PassProvider>,
}

impl RegisteredTool {
    fn new<T: Tool + 'static>(tool: T) -> Self {
        let tool = Rc::new(tool);
        Self {
            provider: Rc::clone(&tool) as Rc<dyn PassProvider>,
            tool,
        }
    }

    pub fn tool(&self) -> &Rc<dyn Tool> {
        &self.tool
    }

    pub fn provider(&self) -> &Rc<dyn PassProvider> {
        &self.provider
    }

    pub fn info(&self) -> &ToolInfo {
        self.tool.info()
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.info().name)
            .finish()
    }
}

/// A tool whose construction failed.
#[derive(Debug)]
pub struct ToolFailure {
    pub info: ToolInfo,
    pub error: ShaderError,
}

/// The set of selectable tools.
///
/// Construction failures are kept next to the working tools; one broken tool
/// never takes the others down.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    failures: Vec<ToolFailure>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and registers every built-in tool.
    pub fn with_builtin(ctx: &GpuContext, cache: &mut ProgramCache) -> Self {
        let mut registry = Self::new();
        registry.try_register(Passthrough::INFO, Passthrough::new(ctx, cache));
        registry.try_register(Invert::INFO, Invert::new(ctx, cache));
        registry.try_register(Levels::INFO, Levels::new(ctx, cache));
        registry.try_register(Blur::INFO, Blur::new(ctx, cache));
        registry.try_register(Noise::INFO, Noise::new(ctx, cache));
        registry.try_register(Transform::INFO, Transform::new(ctx, cache));
        tracing::info!(
            available = registry.tools.len(),
            failed = registry.failures.len(),
            "registered built-in tools"
        );
        registry
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &RegisteredTool {
        tracing::debug!(tool = tool.info().name, "registered tool");
        self.tools.push(RegisteredTool::new(tool));
        &self.tools[self.tools.len() - 1]
    }

    /// Registers `tool`, or records why it could not be built.
    pub fn try_register<T: Tool + 'static>(&mut self, info: ToolInfo, tool: Result<T, ShaderError>) {
        match tool {
            Ok(tool) => {
                self.register(tool);
            }
            Err(error) => {
                tracing::error!(tool = info.name, %error, "tool unavailable");
                self.failures.push(ToolFailure { info, error });
            }
        }
    }

    pub fn find(&self, name: &str) -> Result<&RegisteredTool, ToolError> {
        if let Some(tool) = self.tools.iter().find(|tool| tool.info().matches(name)) {
            return Ok(tool);
        }
        match self.failures.iter().find(|failure| failure.info.matches(name)) {
            Some(failure) => Err(ToolError::Unavailable {
                tool: failure.info.name.to_string(),
                reason: failure.error.to_string(),
            }),
            None => Err(ToolError::UnknownTool(name.to_string())),
        }
    }

    pub fn tools(&self) -> &[RegisteredTool] {
        &self.tools
    }

    pub fn failures(&self) -> &[ToolFailure] {
        &self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::new("sigma", 0.0, 40.0, 4.0),
        ParamSpec::toggle("wrap_x", true),
    ];

    #[test]
    fn parameters_start_at_defaults() {
        let params = ParamSet::new(SPECS);
        assert_eq!(params.get("sigma"), Some(4.0));
        assert!(params.flag("wrap_x"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.value("missing"), 0.0);
    }

    #[test]
    fn set_clamps_into_range() {
        let params = ParamSet::new(SPECS);
        assert_eq!(params.set("blur", "sigma", 100.0).unwrap(), 40.0);
        assert_eq!(params.set("blur", "SIGMA", -3.0).unwrap(), 0.0);
        assert_eq!(params.get("sigma"), Some(0.0));
    }

    #[test]
    fn set_rejects_unknown_names_and_nan() {
        let params = ParamSet::new(SPECS);
        assert!(matches!(
            params.set("blur", "radius", 1.0),
            Err(ToolError::UnknownParameter { .. })
        ));
        assert!(matches!(
            params.set("blur", "sigma", f32::NAN),
            Err(ToolError::InvalidValue { .. })
        ));
        assert_eq!(params.get("sigma"), Some(4.0));
    }

    #[test]
    fn reset_restores_defaults() {
        let params = ParamSet::new(SPECS);
        params.set("blur", "sigma", 12.0).unwrap();
        params.set("blur", "wrap_x", 0.0).unwrap();
        params.reset();
        assert_eq!(params.get("sigma"), Some(4.0));
        assert!(params.flag("wrap_x"));
    }

    #[test]
    fn info_matches_names_and_aliases() {
        let info = ToolInfo {
            name: "Noise",
            aliases: &["Gaussian Noise", "Perlin Noise"],
            description: "Generate noise pattern",
        };
        assert!(info.matches("noise"));
        assert!(info.matches("perlin-noise"));
        assert!(info.matches(" GAUSSIAN_NOISE "));
        assert!(!info.matches("blur"));
    }

    #[test]
    fn failed_tools_are_unavailable_not_unknown() {
        let mut registry = ToolRegistry::new();
        registry.try_register::<Invert>(
            Invert::INFO,
            Err(ShaderError::Link {
                program: "invert".into(),
                log: "boom".into(),
            }),
        );
        assert_eq!(registry.failures().len(), 1);
        match registry.find("flip") {
            Err(ToolError::Unavailable { tool, reason }) => {
                assert_eq!(tool, "Invert");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected lookup result: {other:?}"),
        }
    }

    #[test]
    fn empty_registry_reports_unknown_tools() {
        let registry = ToolRegistry::new();
        assert!(matches!(registry.find("invert"), Err(ToolError::UnknownTool(_))));
        assert!(registry.tools().is_empty());
        assert!(registry.failures().is_empty());
    }
}
