//! Template evaluation against JSON data
//!
//! Values are looked up through a context stack: sections push the value they
//! iterate over, and a name is resolved against the innermost frame that has
//! it. Partials are resolved from the template's own partials first, then from
//! the registry.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::config::RenderConfig;
use crate::parser::{KeyPath, Node, Spanned};
use crate::partial::PartialRegistry;
use crate::template::Template;
use crate::RenderError;

/// Renders templates, resolving partials through a registry
#[derive(Debug, Clone)]
pub struct Renderer<'r> {
    registry: &'r PartialRegistry,
    config: RenderConfig,
}

impl<'r> Renderer<'r> {
    pub fn new(registry: &'r PartialRegistry) -> Self {
        Self {
            registry,
            config: RenderConfig::default(),
        }
    }

    /// Set the render configuration
    pub fn with_config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Render a compiled template with the given data
    pub fn render(&self, template: &Template, data: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut stack = vec![data];
        self.render_nodes(template, template.nodes(), &mut stack, &mut out, 0)?;
        Ok(out)
    }

    /// Render with any serializable data
    pub fn render_serialize<T>(&self, template: &Template, data: &T) -> Result<String, RenderError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(data)?;
        self.render(template, &value)
    }

    fn render_nodes<'v>(
        &self,
        root: &Template,
        nodes: &[Spanned<Node>],
        stack: &mut Vec<&'v Value>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), RenderError> {
        for node in nodes {
            match &node.node {
                Node::Text(text) => out.push_str(text),
                Node::Variable { path, escape } => {
                    if let Some(value) = resolve(stack, path) {
                        let text = stringify(value);
                        if *escape && self.config.escape_html {
                            escape_html_into(&text, out);
                        } else {
                            out.push_str(&text);
                        }
                    }
                }
                Node::Section {
                    path,
                    inverted: true,
                    children,
                } => {
                    if !is_truthy(resolve(stack, path)) {
                        self.render_nodes(root, children, stack, out, depth)?;
                    }
                }
                Node::Section {
                    path,
                    inverted: false,
                    children,
                } => match resolve(stack, path) {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            self.render_nodes(root, children, stack, out, depth)?;
                            stack.pop();
                        }
                    }
                    Some(value) if is_truthy(Some(value)) => {
                        stack.push(value);
                        self.render_nodes(root, children, stack, out, depth)?;
                        stack.pop();
                    }
                    _ => {}
                },
                Node::Partial { name } => self.render_partial(root, name, stack, out, depth)?,
            }
        }
        Ok(())
    }

    fn render_partial<'v>(
        &self,
        root: &Template,
        name: &str,
        stack: &mut Vec<&'v Value>,
        out: &mut String,
        depth: usize,
    ) -> Result<(), RenderError> {
        let Some(partial) = root
            .local_partial(name)
            .or_else(|| self.registry.lookup(name))
        else {
            if self.config.strict_partials {
                return Err(RenderError::PartialNotFound {
                    name: name.to_string(),
                });
            }
            debug!(partial = %name, "partial not found, rendering nothing");
            return Ok(());
        };

        if depth >= self.config.max_partial_depth {
            return Err(RenderError::PartialDepth {
                name: name.to_string(),
                limit: self.config.max_partial_depth,
            });
        }

        let template = self
            .registry
            .materialize(&partial)
            .map_err(|source| RenderError::Partial {
                name: name.to_string(),
                source,
            })?;
        self.render_nodes(root, template.nodes(), stack, out, depth + 1)
    }
}

fn resolve<'v>(stack: &[&'v Value], path: &KeyPath) -> Option<&'v Value> {
    let Some((first, rest)) = path.segments.split_first() else {
        return stack.last().copied();
    };

    let mut value = stack
        .iter()
        .rev()
        .copied()
        .find_map(|frame| child(frame, first))?;
    for segment in rest {
        value = child(value, segment)?;
    }
    Some(value)
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => value.get(key),
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn stringify(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        other => Cow::Owned(other.to_string()),
    }
}

fn escape_html_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}
