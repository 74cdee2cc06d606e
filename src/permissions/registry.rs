//! Permission handler registry
//!
//! Handlers are looked up by a dotted name such as
//! `zinnia.permissions.DefaultPermissionHandler`. The name is split at the
//! last `.` into a module path and a symbol; both must be registered.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::{DefaultPermissionHandler, DynPermissionHandler, StaffPermissionHandler};

/// Builds a handler instance
pub type HandlerFactory = Arc<dyn Fn() -> DynPermissionHandler + Send + Sync>;

/// Module path the built-in handlers are registered under
pub const BUILTIN_MODULE: &str = "zinnia.permissions";

/// Handler resolution errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Error importing permission handler {path}: {reason}")]
    ImproperlyConfigured { path: String, reason: String },

    #[error("Error importing permission handler module {module}: module not found")]
    ModuleNotFound { module: String },

    #[error("Module \"{module}\" does not define a \"{symbol}\" permission handler")]
    SymbolNotFound { module: String, symbol: String },
}

/// Registry of handler factories keyed by module path, then symbol
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    modules: HashMap<String, HashMap<String, HandlerFactory>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the default and staff handlers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.insert(BUILTIN_MODULE, "DefaultPermissionHandler", Arc::new(|| {
            Arc::new(DefaultPermissionHandler::new()) as DynPermissionHandler
        }));
        registry.insert(BUILTIN_MODULE, "StaffPermissionHandler", Arc::new(|| {
            Arc::new(StaffPermissionHandler::new()) as DynPermissionHandler
        }));
        registry
    }

    /// Register a factory under a dotted path, replacing any previous one
    pub fn register<F>(&mut self, path: &str, factory: F) -> Result<(), ResolveError>
    where
        F: Fn() -> DynPermissionHandler + Send + Sync + 'static,
    {
        let (module, symbol) = split_path(path)?;
        self.insert(module, symbol, Arc::new(factory));
        debug!("Registered permission handler {}.{}", module, symbol);
        Ok(())
    }

    fn insert(&mut self, module: &str, symbol: &str, factory: HandlerFactory) {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), factory);
    }

    /// Resolve a configured handler name.
    ///
    /// Returns `Ok(None)` when the name is empty or blank.
    pub fn resolve(&self, name: &str) -> Result<Option<DynPermissionHandler>, ResolveError> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }

        let (module, symbol) = split_path(name)?;
        debug!(module = module, symbol = symbol, "Resolving permission handler");

        let symbols = self.modules.get(module).ok_or_else(|| ResolveError::ModuleNotFound {
            module: module.to_string(),
        })?;
        let factory = symbols.get(symbol).ok_or_else(|| ResolveError::SymbolNotFound {
            module: module.to_string(),
            symbol: symbol.to_string(),
        })?;

        Ok(Some(factory()))
    }

    /// Check whether a dotted path is registered
    pub fn contains(&self, path: &str) -> bool {
        match split_path(path.trim()) {
            Ok((module, symbol)) => self
                .modules
                .get(module)
                .is_some_and(|symbols| symbols.contains_key(symbol)),
            Err(_) => false,
        }
    }

    /// Every registered dotted path, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .modules
            .iter()
            .flat_map(|(module, symbols)| symbols.keys().map(move |symbol| format!("{}.{}", module, symbol)))
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Resolve the configured handler, falling back to the default policy
pub fn resolve_handler(
    configured: Option<&str>,
    registry: &HandlerRegistry,
) -> Result<DynPermissionHandler, ResolveError> {
    match registry.resolve(configured.unwrap_or(""))? {
        Some(handler) => Ok(handler),
        None => {
            debug!("No permission handler configured, using the default policy");
            Ok(Arc::new(DefaultPermissionHandler::new()))
        }
    }
}

fn split_path(path: &str) -> Result<(&str, &str), ResolveError> {
    let malformed = |reason: &str| ResolveError::ImproperlyConfigured {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let (module, symbol) = path
        .rsplit_once('.')
        .ok_or_else(|| malformed("not a dotted path"))?;
    if module.is_empty() || symbol.is_empty() {
        return Err(malformed("empty module or symbol name"));
    }
    Ok((module, symbol))
}
