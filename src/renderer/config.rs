//! Configuration for template rendering

/// Configuration options for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Fail when a referenced partial cannot be found instead of rendering nothing
    pub strict_partials: bool,

    /// Maximum nesting of partials inside partials
    pub max_partial_depth: usize,

    /// Escape HTML in `{{name}}` interpolations
    pub escape_html: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            strict_partials: false,
            max_partial_depth: 32,
            escape_html: true,
        }
    }
}

impl RenderConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether missing partials are errors
    pub fn with_strict_partials(mut self, strict: bool) -> Self {
        self.strict_partials = strict;
        self
    }

    /// Set the maximum partial nesting depth
    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    /// Set whether interpolations are HTML-escaped
    pub fn with_escape_html(mut self, escape: bool) -> Self {
        self.escape_html = escape;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert!(!config.strict_partials);
        assert_eq!(config.max_partial_depth, 32);
        assert!(config.escape_html);
    }

    #[test]
    fn test_builder_pattern() {
        let config = RenderConfig::new()
            .with_strict_partials(true)
            .with_max_partial_depth(4)
            .with_escape_html(false);

        assert!(config.strict_partials);
        assert_eq!(config.max_partial_depth, 4);
        assert!(!config.escape_html);
    }
}
