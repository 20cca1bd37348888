/// Runtime configuration.
///
/// `Settings` is plain data loaded from an optional file and `MAPPERUST_*`
/// environment variables. `Configuration` is everything a session factory
/// shares with its sessions: the settings, the statement registry, the
/// namespace caches, the mapper definitions and the interceptor chain.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use crate::cache::{Cache, CacheBuilder, CacheSettings};
use crate::core::{DatabaseError, MappedStatement};
use crate::executor::{ExecutorOptions, ExecutorType, LocalCacheScope, DEFAULT_CURSOR_CAPACITY};
use crate::plugin::{InterceptorChain, PluginRegistry};
use super::mapper::{Mapper, MapperDefinition};

pub const ENV_PREFIX: &str = "MAPPERUST";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment id; part of every cache key
    pub environment: String,
    /// Second-level caching on or off for every namespace
    pub cache_enabled: bool,
    pub default_executor_type: ExecutorType,
    pub local_cache_scope: LocalCacheScope,
    pub auto_commit: bool,
    /// Rows buffered between a cursor's producer and its reader
    pub cursor_capacity: usize,
    /// Cache settings per namespace
    pub caches: HashMap<String, CacheSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "default".to_string(),
            cache_enabled: true,
            default_executor_type: ExecutorType::Simple,
            local_cache_scope: LocalCacheScope::Session,
            auto_commit: false,
            cursor_capacity: DEFAULT_CURSOR_CAPACITY,
            caches: HashMap::new(),
        }
    }
}

impl Settings {
    /// Priority: environment > file > defaults
    pub fn load(path: Option<&Path>) -> Result<Self, DatabaseError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder.build()?.try_deserialize()?;
        tracing::debug!(?settings, "loaded settings");
        Ok(settings)
    }

    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            environment: self.environment.clone(),
            local_cache_scope: self.local_cache_scope,
            cache_enabled: self.cache_enabled,
            cursor_capacity: self.cursor_capacity,
        }
    }
}

pub struct Configuration {
    settings: Settings,
    statements: HashMap<String, Arc<MappedStatement>>,
    caches: HashMap<String, Arc<dyn Cache>>,
    mappers: HashMap<String, Arc<MapperDefinition>>,
    interceptor_chain: InterceptorChain,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl Configuration {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            statements: HashMap::new(),
            caches: HashMap::new(),
            mappers: HashMap::new(),
            interceptor_chain: InterceptorChain::default(),
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn environment(&self) -> &str {
        &self.settings.environment
    }

    /// Shared cache of a namespace, built from its settings on first request
    pub fn namespace_cache(&mut self, namespace: &str) -> Arc<dyn Cache> {
        if let Some(cache) = self.caches.get(namespace) {
            return Arc::clone(cache);
        }
        let settings = self.settings.caches.get(namespace).cloned().unwrap_or_default();
        let cache = CacheBuilder::from_settings(namespace, &settings).build();
        self.caches.insert(namespace.to_string(), Arc::clone(&cache));
        cache
    }

    /// Registers a hand-built cache for the namespace it reports as its id
    pub fn add_cache(&mut self, cache: Arc<dyn Cache>) {
        self.caches.insert(cache.id().to_string(), cache);
    }

    pub fn cache(&self, namespace: &str) -> Option<Arc<dyn Cache>> {
        self.caches.get(namespace).cloned()
    }

    pub fn cache_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.caches.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn add_mapped_statement(&mut self, statement: MappedStatement) -> Result<(), DatabaseError> {
        if self.statements.contains_key(&statement.id) {
            return Err(DatabaseError::StatementAlreadyExists(statement.id));
        }
        tracing::debug!(statement = %statement.id, command = statement.command_type.as_str(), "registered statement");
        self.statements.insert(statement.id.clone(), Arc::new(statement));
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).cloned()
    }

    pub fn mapped_statement(&self, id: &str) -> Result<Arc<MappedStatement>, DatabaseError> {
        self.lookup(id)
            .ok_or_else(|| DatabaseError::StatementNotFound(id.to_string()))
    }

    pub fn has_statement(&self, id: &str) -> bool {
        self.statements.contains_key(id)
    }

    pub fn statement_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.statements.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn add_mapper(&mut self, definition: MapperDefinition) {
        self.mappers
            .insert(definition.namespace().to_string(), Arc::new(definition));
    }

    pub fn mapper(&self, namespace: &str) -> Result<Mapper, DatabaseError> {
        self.mappers
            .get(namespace)
            .map(|definition| Mapper::new(Arc::clone(definition)))
            .ok_or_else(|| DatabaseError::StatementNotFound(namespace.to_string()))
    }

    pub fn set_plugins(&mut self, registry: PluginRegistry) {
        self.interceptor_chain = registry.build();
    }

    pub const fn interceptor_chain(&self) -> &InterceptorChain {
        &self.interceptor_chain
    }
}
