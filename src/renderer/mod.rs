//! Text renderer for compiled templates
//!
//! This module takes a compiled Template and JSON data and produces the
//! rendered string, resolving partials through a PartialRegistry.

pub mod config;
pub mod engine;

pub use config::RenderConfig;
pub use engine::Renderer;
