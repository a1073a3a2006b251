//! Partial registry and fallback resolution
//!
//! Partials are named template fragments referenced from other templates with
//! `{{> name}}`. A [`PartialRegistry`] stores them by name, compiles each one
//! the first time it is rendered, and falls back to a [`PartialResolver`] for
//! names it does not hold.
//!
//! # Example
//!
//! ```rust
//! use stache_partials::PartialRegistry;
//!
//! let registry = PartialRegistry::new();
//! registry.register("header", "<h1>{{title}}</h1>").unwrap();
//!
//! let partial = registry.lookup("header").unwrap();
//! let template = registry.materialize(&partial).unwrap();
//! assert_eq!(template.nodes().len(), 3);
//!
//! assert!(registry.register("header", "again").is_err());
//! ```

mod registry;
mod resolver;

pub use registry::{BatchRegistrationError, Partial, PartialRegistry, RegistryError};
pub use resolver::{
    DirectoryResolver, NoResolver, PartialResolver, ResolverConfig, ResolverConfigError,
};
