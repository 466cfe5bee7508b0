//! GPU building blocks shared by the compositor and the preview surface.
//!
//! - `context` acquires the wgpu device, owns the canvas (the visible
//!   surface) and the static full-screen quad, and exposes the two bind group
//!   layouts every pass pipeline is built against.
//! - `program` turns a vertex/fragment GLSL pair into an immutable render
//!   pipeline plus its reflected uniform block, with a source-keyed cache.
//! - `uniforms` resolves named scalar/vector values against a reflected block
//!   and packs them into the bytes uploaded for a single pass.
//! - `targets` owns textures and the two-slot ping-pong render target pool.
//! - `readback` copies a texture back into an `RgbaImage`.

pub mod context;
pub mod program;
pub(crate) mod readback;
pub mod targets;
pub mod uniforms;
