//! Stache Partials - a concurrency-safe partial registry for Mustache-style templates
//!
//! This library provides a partial registry together with the compiler and
//! renderer it serves. Partials are registered by name, compiled the first
//! time they are used, and shared across any number of concurrent renders.
//!
//! # Example
//!
//! ```rust
//! use stache_partials::{render_with_registry, PartialRegistry};
//! use serde_json::json;
//!
//! let registry = PartialRegistry::new();
//! registry.register("header", "<h1>{{title}}</h1>").unwrap();
//!
//! let html = render_with_registry("{{> header}}", &registry, &json!({"title": "Hi"})).unwrap();
//! assert_eq!(html, "<h1>Hi</h1>");
//! ```

pub mod error;
pub mod parser;
pub mod partial;
pub mod renderer;
pub mod template;

pub use error::{CompileError, ParseError};
pub use partial::{
    BatchRegistrationError, DirectoryResolver, NoResolver, Partial, PartialRegistry,
    PartialResolver, RegistryError, ResolverConfig, ResolverConfigError,
};
pub use renderer::{RenderConfig, Renderer};
pub use template::{Compile, MustacheCompiler, Template};

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during the render pipeline
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template itself failed to compile
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// A referenced partial was not found and strict partials are enabled
    #[error("partial not found: {name}")]
    PartialNotFound { name: String },

    /// Partials nested deeper than the configured limit
    #[error("partial '{name}' exceeds the maximum nesting depth of {limit}")]
    PartialDepth { name: String, limit: usize },

    /// A referenced partial failed to compile
    #[error("partial '{name}' failed to compile: {source}")]
    Partial { name: String, source: CompileError },

    /// Render data could not be converted to JSON
    #[error("invalid render data: {0}")]
    Data(#[from] serde_json::Error),
}

/// Render template source using the process-wide registry
///
/// # Example
///
/// ```rust
/// use stache_partials::render;
/// use serde_json::json;
///
/// let out = render("Hello {{name}}!", &json!({"name": "World"})).unwrap();
/// assert_eq!(out, "Hello World!");
/// ```
pub fn render(source: &str, data: &Value) -> Result<String, RenderError> {
    render_with_registry(source, PartialRegistry::global(), data)
}

/// Render template source resolving partials through the given registry
pub fn render_with_registry(
    source: &str,
    registry: &PartialRegistry,
    data: &Value,
) -> Result<String, RenderError> {
    render_with_config(source, registry, data, RenderConfig::default())
}

/// Render template source with custom configuration
///
/// # Example
///
/// ```rust
/// use stache_partials::{render_with_config, PartialRegistry, RenderConfig, RenderError};
/// use serde_json::json;
///
/// let registry = PartialRegistry::new();
/// let config = RenderConfig::new().with_strict_partials(true);
///
/// let err = render_with_config("{{> missing}}", &registry, &json!({}), config).unwrap_err();
/// assert!(matches!(err, RenderError::PartialNotFound { .. }));
/// ```
pub fn render_with_config(
    source: &str,
    registry: &PartialRegistry,
    data: &Value,
    config: RenderConfig,
) -> Result<String, RenderError> {
    let template = Template::compile(source)?;
    Renderer::new(registry)
        .with_config(config)
        .render(&template, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_plain_text() {
        assert_eq!(render("just text", &json!({})).unwrap(), "just text");
    }

    #[test]
    fn test_render_compile_error() {
        let result = render("{{#a}}", &json!({}));
        assert!(matches!(result, Err(RenderError::Compile(_))));
    }

    #[test]
    fn test_render_with_registry_partial() {
        let registry = PartialRegistry::new();
        registry.register("name", "<b>{{name}}</b>").unwrap();
        let out =
            render_with_registry("Hi {{> name}}", &registry, &json!({"name": "Ada"})).unwrap();
        assert_eq!(out, "Hi <b>Ada</b>");
    }

    #[test]
    fn test_missing_partial_lenient_by_default() {
        let registry = PartialRegistry::new();
        let out = render_with_registry("[{{> nope}}]", &registry, &json!({})).unwrap();
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_render_error_messages() {
        let err = RenderError::PartialDepth {
            name: "loop".to_string(),
            limit: 3,
        };
        assert_eq!(
            err.to_string(),
            "partial 'loop' exceeds the maximum nesting depth of 3"
        );
    }
}
