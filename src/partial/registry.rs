//! Partial registry for storing, resolving and materializing partials

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, trace};

use super::resolver::{NoResolver, PartialResolver};
use crate::error::CompileError;
use crate::template::{Compile, MustacheCompiler, Template};

/// Errors that can occur when registering partials
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A partial with this name is already registered
    #[error("partial already registered: {name}")]
    DuplicateName { name: String },

    /// Partial names must not be empty
    #[error("partial name must not be empty")]
    EmptyName,
}

/// Every failure from one `register_many` call
///
/// Entries that did not fail stay registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_failures(.failures))]
pub struct BatchRegistrationError {
    pub failures: Vec<RegistryError>,
}

fn format_failures(failures: &[RegistryError]) -> String {
    let details = failures
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "{} of the partials could not be registered: {}",
        failures.len(),
        details
    )
}

/// A named template fragment
///
/// The compiled form is written at most once per instance. Registering a
/// name again after removal creates a new instance.
pub struct Partial {
    name: String,
    source: Option<String>,
    compiled: OnceLock<Arc<Template>>,
}

impl Partial {
    /// Create an uncompiled partial from source
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: Some(source.into()),
            compiled: OnceLock::new(),
        }
    }

    /// Create a partial from an already-compiled template
    pub fn from_template(name: impl Into<String>, template: impl Into<Arc<Template>>) -> Self {
        let compiled = OnceLock::new();
        let _ = compiled.set(template.into());
        Self {
            name: name.into(),
            source: None,
            compiled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw source, absent for partials built from a compiled template
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Check whether the compiled form is available
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// The compiled form, if it has been materialized
    pub fn compiled(&self) -> Option<Arc<Template>> {
        self.compiled.get().cloned()
    }

    /// Compile on first use with the given compiler and cache the result
    ///
    /// Failures are not cached. Two threads racing on the first call may both
    /// compile; only one result is stored and both callers get the stored one.
    pub fn template_with(&self, compiler: &dyn Compile) -> Result<Arc<Template>, CompileError> {
        if let Some(template) = self.compiled.get() {
            return Ok(Arc::clone(template));
        }

        let source = self.source.as_deref().unwrap_or_default();
        debug!(partial = %self.name, "compiling partial");
        let template = Arc::new(compiler.compile(source)?);
        Ok(Arc::clone(self.compiled.get_or_init(|| template)))
    }
}

impl fmt::Debug for Partial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partial")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

static GLOBAL_REGISTRY: LazyLock<PartialRegistry> = LazyLock::new(PartialRegistry::new);

/// Concurrency-safe registry of named partials
///
/// Mutations take the write lock; probes take the read lock. Compilation and
/// fallback resolution run with no registry lock held, so a resolver may call
/// back into the same registry.
pub struct PartialRegistry {
    partials: RwLock<HashMap<String, Arc<Partial>>>,
    resolver: RwLock<Arc<dyn PartialResolver>>,
    compiler: Arc<dyn Compile>,
}

impl Default for PartialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PartialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialRegistry")
            .field("partials", &self.names())
            .finish_non_exhaustive()
    }
}

impl PartialRegistry {
    /// Create an empty registry with the built-in compiler and no fallback
    pub fn new() -> Self {
        Self {
            partials: RwLock::new(HashMap::new()),
            resolver: RwLock::new(Arc::new(NoResolver)),
            compiler: Arc::new(MustacheCompiler),
        }
    }

    /// The process-wide registry, for hosts that want a single shared instance
    pub fn global() -> &'static PartialRegistry {
        &GLOBAL_REGISTRY
    }

    /// Set the fallback resolver at construction
    pub fn with_resolver(self, resolver: impl PartialResolver + 'static) -> Self {
        self.set_fallback_resolver(resolver);
        self
    }

    /// Set the compiler used for materialization
    pub fn with_compiler(mut self, compiler: impl Compile + 'static) -> Self {
        self.compiler = Arc::new(compiler);
        self
    }

    /// Register a partial from source
    pub fn register(
        &self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.insert(Partial::new(name, source))
    }

    /// Register several partials
    ///
    /// Each entry is registered on its own. A failing entry does not undo the
    /// entries before it and does not stop the entries after it; all failures
    /// are returned together.
    pub fn register_many<I, K, V>(&self, entries: I) -> Result<(), BatchRegistrationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let failures: Vec<RegistryError> = entries
            .into_iter()
            .filter_map(|(name, source)| self.register(name, source).err())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchRegistrationError { failures })
        }
    }

    /// Register a partial from an already-compiled template
    pub fn register_compiled(
        &self,
        name: impl Into<String>,
        template: impl Into<Arc<Template>>,
    ) -> Result<(), RegistryError> {
        self.insert(Partial::from_template(name, template))
    }

    fn insert(&self, partial: Partial) -> Result<(), RegistryError> {
        if partial.name().is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut partials = self.partials.write().unwrap_or_else(PoisonError::into_inner);
        if partials.contains_key(partial.name()) {
            return Err(RegistryError::DuplicateName {
                name: partial.name().to_string(),
            });
        }

        debug!(partial = %partial.name(), compiled = partial.is_compiled(), "registered partial");
        partials.insert(partial.name().to_string(), Arc::new(partial));
        Ok(())
    }

    /// Remove a partial; removing an unknown name is a no-op
    pub fn remove(&self, name: &str) -> Option<Arc<Partial>> {
        let removed = self
            .partials
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        if removed.is_some() {
            debug!(partial = %name, "removed partial");
        }
        removed
    }

    /// Drop every registered partial
    ///
    /// Partials already handed out stay alive for their holders.
    pub fn clear(&self) {
        let old = std::mem::take(
            &mut *self.partials.write().unwrap_or_else(PoisonError::into_inner),
        );
        debug!(count = old.len(), "cleared partial registry");
    }

    /// Get a registered partial without consulting the fallback resolver
    pub fn get(&self, name: &str) -> Option<Arc<Partial>> {
        self.partials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Resolve a partial by name
    ///
    /// Registered partials win. Otherwise the fallback resolver is asked; its
    /// result is returned as-is and never stored.
    pub fn lookup(&self, name: &str) -> Option<Arc<Partial>> {
        if let Some(partial) = self.get(name) {
            trace!(partial = %name, "found registered partial");
            return Some(partial);
        }

        let resolver = self.resolver();
        let resolved = resolver.resolve(name);
        debug!(partial = %name, found = resolved.is_some(), "consulted fallback resolver");
        resolved
    }

    /// Get the compiled form of a partial, compiling it on first use
    pub fn materialize(&self, partial: &Partial) -> Result<Arc<Template>, CompileError> {
        partial.template_with(self.compiler.as_ref())
    }

    /// Replace the fallback resolver
    pub fn set_fallback_resolver(&self, resolver: impl PartialResolver + 'static) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(resolver);
    }

    /// Restore the default resolver, which never finds anything
    pub fn clear_fallback_resolver(&self) {
        self.set_fallback_resolver(NoResolver);
    }

    /// Check if a partial is registered
    pub fn contains(&self, name: &str) -> bool {
        self.partials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Names of all registered partials, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .partials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.partials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Clones the resolver out so the slot lock is released before it runs.
    fn resolver(&self) -> Arc<dyn PartialResolver> {
        Arc::clone(&self.resolver.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_compiler(calls: Arc<AtomicUsize>) -> impl Compile + 'static {
        move |source: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Template::compile(source)
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PartialRegistry::new();
        registry.register("header", "<h1>{{title}}</h1>").unwrap();

        let partial = registry.lookup("header").expect("registered");
        assert_eq!(partial.name(), "header");
        assert_eq!(partial.source(), Some("<h1>{{title}}</h1>"));
        assert!(!partial.is_compiled());
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let registry = PartialRegistry::new();
        registry.register("x", "first").unwrap();
        let err = registry.register("x", "second").unwrap_err();

        assert_eq!(
            err,
            RegistryError::DuplicateName {
                name: "x".to_string()
            }
        );
        assert_eq!(registry.lookup("x").unwrap().source(), Some("first"));
    }

    #[test]
    fn test_duplicate_of_compiled_partial() {
        let registry = PartialRegistry::new();
        registry.register("x", "source").unwrap();
        let result = registry.register_compiled("x", Template::default());
        assert!(matches!(result, Err(RegistryError::DuplicateName { .. })));
    }

    #[test]
    fn test_empty_name_rejected() {
        let registry = PartialRegistry::new();
        assert_eq!(registry.register("", "x"), Err(RegistryError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = PartialRegistry::new();
        assert!(registry.remove("missing").is_none());

        registry.register("a", "x").unwrap();
        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_reregister_after_remove_creates_new_instance() {
        let registry = PartialRegistry::new();
        registry.register("a", "one").unwrap();
        let old = registry.lookup("a").unwrap();
        registry.materialize(&old).unwrap();

        registry.remove("a");
        registry.register("a", "two").unwrap();
        let new = registry.lookup("a").unwrap();

        assert!(!Arc::ptr_eq(&old, &new));
        assert!(old.is_compiled());
        assert!(!new.is_compiled());
        assert_eq!(new.source(), Some("two"));
    }

    #[test]
    fn test_clear_keeps_handed_out_partials() {
        let registry = PartialRegistry::new();
        registry.register("a", "x").unwrap();
        let held = registry.lookup("a").unwrap();

        registry.clear();

        assert!(registry.lookup("a").is_none());
        assert!(registry.is_empty());
        assert_eq!(held.source(), Some("x"));
    }

    #[test]
    fn test_register_many_reports_all_failures() {
        let registry = PartialRegistry::new();
        registry.register("taken", "x").unwrap();

        let err = registry
            .register_many([("a", "1"), ("taken", "2"), ("", "3"), ("b", "4")])
            .unwrap_err();

        assert_eq!(err.failures.len(), 2);
        assert!(err.failures.contains(&RegistryError::DuplicateName {
            name: "taken".to_string()
        }));
        assert!(err.failures.contains(&RegistryError::EmptyName));
        assert_eq!(registry.names(), vec!["a", "b", "taken"]);
        assert_eq!(registry.get("taken").unwrap().source(), Some("x"));
    }

    #[test]
    fn test_register_many_from_map() {
        let registry = PartialRegistry::new();
        let entries: HashMap<String, String> = [
            ("a".to_string(), "A".to_string()),
            ("b".to_string(), "B".to_string()),
        ]
        .into_iter()
        .collect();

        registry.register_many(entries).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_materialize_compiles_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PartialRegistry::new().with_compiler(counting_compiler(calls.clone()));
        registry.register("p", "Hello {{name}}").unwrap();

        let partial = registry.lookup("p").unwrap();
        let first = registry.materialize(&partial).unwrap();
        let second = registry.materialize(&partial).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(partial.is_compiled());
    }

    #[test]
    fn test_materialize_precompiled_skips_compiler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PartialRegistry::new().with_compiler(counting_compiler(calls.clone()));
        let template = Arc::new(Template::compile("static").unwrap());
        registry.register_compiled("p", template.clone()).unwrap();

        let partial = registry.lookup("p").unwrap();
        assert_eq!(partial.source(), None);
        let materialized = registry.materialize(&partial).unwrap();

        assert!(Arc::ptr_eq(&materialized, &template));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_materialize_failure_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = PartialRegistry::new().with_compiler(counting_compiler(calls.clone()));
        registry.register("broken", "{{#open}}").unwrap();
        let partial = registry.lookup("broken").unwrap();

        let first = registry.materialize(&partial).unwrap_err();
        let second = registry.materialize(&partial).unwrap_err();

        assert_eq!(first, second);
        assert!(!partial.is_compiled());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lookup_without_resolver_is_absent() {
        let registry = PartialRegistry::new();
        assert!(registry.lookup("footer").is_none());
    }

    #[test]
    fn test_resolver_result_not_stored() {
        let registry = PartialRegistry::new()
            .with_resolver(|name: &str| Some(Arc::new(Partial::new(name, "ok"))));

        let partial = registry.lookup("dyn").expect("resolved");
        assert_eq!(partial.name(), "dyn");
        assert_eq!(partial.source(), Some("ok"));
        assert!(!registry.contains("dyn"));
        assert!(registry.names().is_empty());
        assert!(registry.get("dyn").is_none());
    }

    #[test]
    fn test_registered_partial_wins_over_resolver() {
        let registry = PartialRegistry::new()
            .with_resolver(|name: &str| Some(Arc::new(Partial::new(name, "resolved"))));
        registry.register("a", "local").unwrap();
        assert_eq!(registry.lookup("a").unwrap().source(), Some("local"));
    }

    #[test]
    fn test_clear_fallback_resolver() {
        let registry = PartialRegistry::new()
            .with_resolver(|name: &str| Some(Arc::new(Partial::new(name, "x"))));
        assert!(registry.lookup("a").is_some());

        registry.clear_fallback_resolver();
        assert!(registry.lookup("a").is_none());
    }

    #[test]
    fn test_set_fallback_resolver_replaces() {
        let registry = PartialRegistry::new();
        registry.set_fallback_resolver(|name: &str| Some(Arc::new(Partial::new(name, "first"))));
        registry.set_fallback_resolver(|name: &str| Some(Arc::new(Partial::new(name, "second"))));
        assert_eq!(registry.lookup("a").unwrap().source(), Some("second"));
    }

    #[test]
    fn test_error_display() {
        let err = RegistryError::DuplicateName {
            name: "header".to_string(),
        };
        assert_eq!(err.to_string(), "partial already registered: header");

        let batch = BatchRegistrationError {
            failures: vec![err, RegistryError::EmptyName],
        };
        assert_eq!(
            batch.to_string(),
            "2 of the partials could not be registered: partial already registered: header; partial name must not be empty"
        );
    }

    #[test]
    fn test_partial_debug_hides_template() {
        let partial = Partial::new("a", "x");
        let debug = format!("{:?}", partial);
        assert!(debug.contains("\"a\""));
        assert!(debug.contains("compiled: false"));
    }
}
