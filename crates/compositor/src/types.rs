/// GPU adapter selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    /// Prefer integrated or otherwise power-efficient adapters.
    #[default]
    Low,
    /// Prefer discrete, high-performance adapters.
    High,
}

impl PowerPreference {
    pub(crate) fn to_wgpu(self) -> wgpu::PowerPreference {
        match self {
            PowerPreference::Low => wgpu::PowerPreference::LowPower,
            PowerPreference::High => wgpu::PowerPreference::HighPerformance,
        }
    }
}

impl std::fmt::Display for PowerPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PowerPreference::Low => f.write_str("low"),
            PowerPreference::High => f.write_str("high"),
        }
    }
}

/// Filtering used when passes sample their input texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplerFilter {
    /// Bilinear filtering, matching the browser editor's texture setup.
    #[default]
    Linear,
    /// Nearest-texel sampling; keeps identity passes bit exact.
    Nearest,
}

impl SamplerFilter {
    pub(crate) fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            SamplerFilter::Linear => wgpu::FilterMode::Linear,
            SamplerFilter::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

impl std::fmt::Display for SamplerFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerFilter::Linear => f.write_str("linear"),
            SamplerFilter::Nearest => f.write_str("nearest"),
        }
    }
}

/// Options used when acquiring the graphics device.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Adapter power policy.
    pub power: PowerPreference,
    /// Accept a software rasterizer when no hardware adapter is present.
    pub allow_fallback_adapter: bool,
    /// Sampler filter shared by every pass.
    pub filter: SamplerFilter,
    /// Debug label attached to the device.
    pub label: String,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            power: PowerPreference::default(),
            allow_fallback_adapter: true,
            filter: SamplerFilter::default(),
            label: "compositor device".to_string(),
        }
    }
}

/// Behavioural knobs for the compositor itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositorOptions {
    /// Colour every pass target is cleared to before its quad is drawn.
    pub clear_color: [f64; 4],
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl CompositorOptions {
    pub(crate) fn clear(&self) -> wgpu::Color {
        let [r, g, b, a] = self.clear_color;
        wgpu::Color { r, g, b, a }
    }
}
