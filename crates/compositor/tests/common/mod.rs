#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use compositor::{
    Compositor, CompositorOptions, ContextOptions, GpuContext, PassDescriptor, PassProvider,
    ProgramInfo, ProviderPasses, SamplerFilter, ShaderProgram, Uniforms, QUAD_VERTEX_SHADER,
};
use image::{Rgba, RgbaImage};

pub const IDENTITY: &str = r"
void main() {
    fragColor = texture(uSampler, vTextureCoord);
}
";

/// Acquires a headless device with nearest sampling, or explains why the
/// calling test is being skipped.
pub fn gpu() -> Option<GpuContext> {
    let options = ContextOptions {
        filter: SamplerFilter::Nearest,
        ..ContextOptions::default()
    };
    match GpuContext::new(&options) {
        Ok(ctx) => Some(ctx),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

pub fn compositor() -> Option<Compositor> {
    gpu().map(|ctx| Compositor::new(ctx, CompositorOptions::default()))
}

/// Opaque image whose every pixel differs from its neighbours.
pub fn pattern(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x + y) * 3 % 256) as u8,
            255,
        ])
    })
}

pub fn program(compositor: &Compositor, label: &str, fragment: &str) -> Rc<ShaderProgram> {
    Rc::new(
        ShaderProgram::new(compositor.context(), label, QUAD_VERTEX_SHADER, fragment)
            .expect("test shader compiles"),
    )
}

pub fn as_provider<P: PassProvider + 'static>(provider: P) -> Rc<dyn PassProvider> {
    Rc::new(provider)
}

/// Simple provider around one program and fixed uniforms.
pub struct SimpleProvider {
    pub label: &'static str,
    pub program: Rc<ShaderProgram>,
    pub uniforms: RefCell<Uniforms>,
}

impl SimpleProvider {
    pub fn new(label: &'static str, program: Rc<ShaderProgram>, uniforms: Uniforms) -> Self {
        Self {
            label,
            program,
            uniforms: RefCell::new(uniforms),
        }
    }
}

impl PassProvider for SimpleProvider {
    fn label(&self) -> &str {
        self.label
    }

    fn passes(&self) -> ProviderPasses<'_> {
        ProviderPasses::Simple(ProgramInfo::new(&self.program, self.uniforms.borrow().clone()))
    }
}

/// Chained provider repeating one program `len` times.
pub struct RepeatProvider {
    pub program: Rc<ShaderProgram>,
    pub len: Cell<usize>,
    pub calls: Cell<usize>,
}

impl RepeatProvider {
    pub fn new(program: Rc<ShaderProgram>, len: usize) -> Self {
        Self {
            program,
            len: Cell::new(len),
            calls: Cell::new(0),
        }
    }
}

impl PassProvider for RepeatProvider {
    fn label(&self) -> &str {
        "repeat"
    }

    fn passes(&self) -> ProviderPasses<'_> {
        self.calls.set(self.calls.get() + 1);
        ProviderPasses::Chained(
            (0..self.len.get())
                .map(|_| PassDescriptor::new(&self.program, Uniforms::new()))
                .collect(),
        )
    }
}

pub fn assert_close(actual: &RgbaImage, expected: &RgbaImage, tolerance: u8) {
    assert_eq!(actual.dimensions(), expected.dimensions());
    for (index, (a, e)) in actual.pixels().zip(expected.pixels()).enumerate() {
        for channel in 0..4 {
            let diff = a.0[channel].abs_diff(e.0[channel]);
            assert!(
                diff <= tolerance,
                "pixel {index} channel {channel}: got {:?}, expected {:?}",
                a.0,
                e.0
            );
        }
    }
}
