//! Terminal output.

pub mod renderer;

pub use renderer::Renderer;
