//! Plugin capability interface and loader.
//!
//! A plugin is a named bundle of callbacks with optional setup and teardown
//! hooks. [`PluginHost`] is the only place that turns plugins into registry
//! entries, so every callback a plugin registers is qualified as
//! `plugin::callback` and can be removed as a unit.

use crate::handlers::core::{Context, Descriptor};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A loadable bundle of callbacks.
pub trait Plugin: Send + Sync + 'static {
    /// Module name; becomes the qualifier of every callback.
    fn name(&self) -> &str;

    /// `(trigger, descriptor)` pairs to register.
    fn callbacks(&self) -> Vec<(&'static str, Descriptor)>;

    /// Runs before the callbacks are registered. An error aborts the load.
    fn initialise(&self, _ctx: &Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs before the callbacks are removed.
    fn destroy(&self, _ctx: &Context) {}
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("invalid plugin name '{0}'")]
    InvalidName(String),

    #[error("plugin '{0}' is not loaded")]
    NotLoaded(String),

    #[error("plugin '{name}' failed to initialise: {source}")]
    Initialise {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl PluginError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "invalid_name",
            Self::NotLoaded(_) => "not_loaded",
            Self::Initialise { .. } => "initialise_failed",
        }
    }
}

/// Loads and unloads plugins against the registry in a [`Context`].
pub struct PluginHost {
    ctx: Context,
    loaded: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginHost {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            loaded: HashMap::new(),
        }
    }

    /// Initialise `plugin` and register its callbacks. A plugin already
    /// loaded under the same name is unloaded first.
    ///
    /// Returns the number of callbacks registered.
    pub fn load(&mut self, plugin: Arc<dyn Plugin>) -> Result<usize, PluginError> {
        let name = plugin.name().to_string();
        if name.is_empty() || name.contains("::") || name.contains(char::is_whitespace) {
            return Err(PluginError::InvalidName(name));
        }
        if self.loaded.contains_key(&name) {
            info!(plugin = %name, "Reloading plugin");
            self.unload(&name)?;
        }

        plugin
            .initialise(&self.ctx)
            .map_err(|source| PluginError::Initialise {
                name: name.clone(),
                source,
            })?;

        let callbacks = plugin.callbacks();
        let count = callbacks.len();
        for (trigger, descriptor) in callbacks {
            self.ctx.registry().register(trigger, descriptor.in_module(&name));
        }
        info!(plugin = %name, callbacks = count, "Plugin loaded");
        self.loaded.insert(name, plugin);
        Ok(count)
    }

    /// Run `destroy` and remove every callback of `name`. Returns the
    /// triggers that lost handlers.
    pub fn unload(&mut self, name: &str) -> Result<Vec<String>, PluginError> {
        let plugin = self
            .loaded
            .remove(name)
            .ok_or_else(|| PluginError::NotLoaded(name.to_string()))?;
        plugin.destroy(&self.ctx);
        let triggers = self.ctx.registry().unregister_module(name);
        info!(plugin = %name, triggers = ?triggers, "Plugin unloaded");
        Ok(triggers)
    }

    pub fn unload_all(&mut self) {
        for name in self.loaded() {
            if let Err(e) = self.unload(&name) {
                warn!(plugin = %name, error = %e, "Failed to unload plugin");
            }
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.loaded.contains_key(name)
    }

    /// Loaded plugin names, sorted.
    pub fn loaded(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loaded.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("loaded", &self.loaded())
            .finish()
    }
}
