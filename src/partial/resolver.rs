//! Fallback resolvers consulted when a partial is not registered

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::registry::Partial;

/// Strategy for finding partials outside a registry
///
/// Resolvers run with no registry lock held and may call back into the
/// registry that invoked them. Whatever they return is handed to the caller
/// and never stored by the registry; caching is up to the resolver.
pub trait PartialResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<Partial>>;
}

/// Resolver that never finds anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl PartialResolver for NoResolver {
    fn resolve(&self, _name: &str) -> Option<Arc<Partial>> {
        None
    }
}

impl<F> PartialResolver for F
where
    F: Fn(&str) -> Option<Arc<Partial>> + Send + Sync,
{
    fn resolve(&self, name: &str) -> Option<Arc<Partial>> {
        self(name)
    }
}

/// Errors that can occur when loading resolver configuration
#[derive(Error, Debug)]
pub enum ResolverConfigError {
    #[error("Failed to read resolver config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse resolver config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Configuration for [`DirectoryResolver`]
///
/// ```toml
/// root = "templates/partials"
/// extension = "mustache"
/// cache = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Directory partial files are read from
    pub root: PathBuf,
    /// File extension appended to the partial name, without the dot
    pub extension: String,
    /// Keep loaded partials so each file is read and compiled once
    pub cache: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extension: "mustache".to_string(),
            cache: true,
        }
    }
}

impl ResolverConfig {
    /// Create a configuration rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Set the file extension
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Enable or disable the resolver's own cache
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Parse a configuration from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, ResolverConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ResolverConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Resolves partials from files under a directory
///
/// `{{> emails/footer}}` reads `<root>/emails/footer.<extension>`. Names that
/// would escape the root are never resolved.
#[derive(Debug)]
pub struct DirectoryResolver {
    config: ResolverConfig,
    cache: RwLock<HashMap<String, Arc<Partial>>>,
}

impl DirectoryResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Path a partial name maps to, if the name is safe
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let safe = !name.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return None;
        }

        let mut path = self.config.root.join(relative);
        if !self.config.extension.is_empty() {
            let file_name = format!(
                "{}.{}",
                path.file_name()?.to_string_lossy(),
                self.config.extension
            );
            path.set_file_name(file_name);
        }
        Some(path)
    }

    /// Forget every cached partial
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn load(&self, name: &str) -> Option<Arc<Partial>> {
        let Some(path) = self.path_for(name) else {
            warn!(partial = %name, "refusing to resolve partial outside root");
            return None;
        };

        match std::fs::read_to_string(&path) {
            Ok(source) => {
                debug!(partial = %name, path = %path.display(), "loaded partial from disk");
                Some(Arc::new(Partial::new(name, source)))
            }
            Err(err) => {
                debug!(partial = %name, path = %path.display(), error = %err, "partial file not readable");
                None
            }
        }
    }
}

impl PartialResolver for DirectoryResolver {
    fn resolve(&self, name: &str) -> Option<Arc<Partial>> {
        if !self.config.cache {
            return self.load(name);
        }

        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(Arc::clone(hit));
        }

        let loaded = self.load(name)?;
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have loaded the same file meanwhile; keep the first.
        Some(Arc::clone(
            cache.entry(name.to_string()).or_insert(loaded),
        ))
    }
}
