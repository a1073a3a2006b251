//! Compiled templates and the compiler seam used by the partial registry

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::CompileError;
use crate::parser::{self, Node, Spanned};
use crate::partial::{Partial, RegistryError};

/// A parsed, directly-renderable template
///
/// Templates may carry their own partials. Those shadow partials of the same
/// name in a registry and are never touched by registry removal or clearing.
#[derive(Debug, Clone, Default)]
pub struct Template {
    nodes: Vec<Spanned<Node>>,
    partials: HashMap<String, Arc<Partial>>,
}

impl Template {
    /// Compile template source
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let nodes = parser::parse(source)?;
        tracing::trace!(nodes = nodes.len(), "compiled template");
        Ok(Self {
            nodes,
            partials: HashMap::new(),
        })
    }

    pub fn nodes(&self) -> &[Spanned<Node>] {
        &self.nodes
    }

    /// Names of every partial referenced by this template, in order of first use
    pub fn partial_names(&self) -> Vec<&str> {
        fn walk<'t>(nodes: &'t [Spanned<Node>], names: &mut Vec<&'t str>) {
            for node in nodes {
                match &node.node {
                    Node::Partial { name } => {
                        if !names.contains(&name.as_str()) {
                            names.push(name);
                        }
                    }
                    Node::Section { children, .. } => walk(children, names),
                    Node::Text(_) | Node::Variable { .. } => {}
                }
            }
        }

        let mut names = Vec::new();
        walk(&self.nodes, &mut names);
        names
    }

    /// Add a template-local partial from source
    pub fn add_partial(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let partial = Partial::new(name, source);
        self.insert_partial(partial)
    }

    /// Add a template-local partial from an already-compiled template
    pub fn add_partial_template(
        &mut self,
        name: impl Into<String>,
        template: impl Into<Arc<Template>>,
    ) -> Result<(), RegistryError> {
        let partial = Partial::from_template(name, template);
        self.insert_partial(partial)
    }

    fn insert_partial(&mut self, partial: Partial) -> Result<(), RegistryError> {
        if partial.name().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.partials.contains_key(partial.name()) {
            return Err(RegistryError::DuplicateName {
                name: partial.name().to_string(),
            });
        }
        self.partials
            .insert(partial.name().to_string(), Arc::new(partial));
        Ok(())
    }

    /// Get a template-local partial
    pub fn local_partial(&self, name: &str) -> Option<Arc<Partial>> {
        self.partials.get(name).cloned()
    }
}

/// The compiler consumed by the partial registry
///
/// Implementations must be pure: the same source always yields an equivalent
/// template or the same errors.
pub trait Compile: Send + Sync {
    fn compile(&self, source: &str) -> Result<Template, CompileError>;
}

/// The built-in Mustache compiler
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheCompiler;

impl Compile for MustacheCompiler {
    fn compile(&self, source: &str) -> Result<Template, CompileError> {
        Template::compile(source)
    }
}

impl<F> Compile for F
where
    F: Fn(&str) -> Result<Template, CompileError> + Send + Sync,
{
    fn compile(&self, source: &str) -> Result<Template, CompileError> {
        self(source)
    }
}
