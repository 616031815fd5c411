//! Callback registry.
//!
//! Maps a trigger key to the handlers registered for it, in registration
//! order. Two keys are reserved: [`ALL`] handlers see every dispatched line
//! and [`DIE`] handlers run once at shutdown. Every other key is an IRC verb
//! or numeric and is stored lower-cased, matching the dispatcher.

use super::traits::{Callback, Descriptor};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Trigger key matching every line.
pub const ALL: &str = "ALL";
/// Trigger key for shutdown hooks.
pub const DIE: &str = "DIE";

/// Normalize a trigger key: reserved keys are kept, the rest lower-cased.
pub fn normalize_trigger(trigger: &str) -> String {
    if trigger == ALL || trigger == DIE {
        trigger.to_string()
    } else {
        trigger.to_ascii_lowercase()
    }
}

/// Registry of callbacks.
#[derive(Default)]
pub struct Registry {
    handlers: DashMap<String, Vec<Arc<Descriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `descriptor` to the list for `trigger`.
    ///
    /// Registering the same handler twice makes it run twice per line.
    pub fn register(&self, trigger: &str, descriptor: Descriptor) -> Arc<Descriptor> {
        let key = normalize_trigger(trigger);
        let descriptor = Arc::new(descriptor.bind_trigger(key.clone()));
        debug!(
            trigger = %key,
            handler = %descriptor.name(),
            class = %descriptor.classification(),
            "Registered handler"
        );
        self.handlers
            .entry(key)
            .or_default()
            .push(Arc::clone(&descriptor));
        descriptor
    }

    /// Snapshot of the handlers registered for one key.
    pub fn handlers_for(&self, trigger: &str) -> Vec<Arc<Descriptor>> {
        self.handlers
            .get(&normalize_trigger(trigger))
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Handlers for a dispatched line: `ALL` handlers first, then the
    /// trigger's own, each group in registration order.
    pub fn lookup(&self, trigger: &str) -> Vec<Arc<Descriptor>> {
        let mut matched = self.handlers_for(ALL);
        if trigger != ALL {
            matched.extend(self.handlers_for(trigger));
        }
        matched
    }

    /// Remove every registration of `handler`, from one trigger or all.
    /// Returns the affected triggers.
    pub fn unregister_by_identity(
        &self,
        handler: &Arc<dyn Callback>,
        trigger: Option<&str>,
    ) -> Vec<String> {
        self.remove_where(trigger, |d| d.is_handler(handler))
    }

    /// Remove registrations by qualified name, from one trigger or all.
    pub fn unregister_by_name(&self, name: &str, trigger: Option<&str>) -> Vec<String> {
        self.remove_where(trigger, |d| d.name() == name)
    }

    /// Remove everything a module registered.
    pub fn unregister_module(&self, module: &str) -> Vec<String> {
        self.remove_where(None, |d| d.module() == Some(module))
    }

    fn remove_where(&self, trigger: Option<&str>, pred: impl Fn(&Descriptor) -> bool) -> Vec<String> {
        let mut affected = Vec::new();
        match trigger {
            Some(trigger) => {
                let key = normalize_trigger(trigger);
                if let Some(mut list) = self.handlers.get_mut(&key) {
                    let before = list.len();
                    list.retain(|d| !pred(d));
                    if list.len() != before {
                        affected.push(key.clone());
                    }
                }
            }
            None => {
                for mut entry in self.handlers.iter_mut() {
                    let before = entry.len();
                    entry.retain(|d| !pred(d));
                    if entry.len() != before {
                        affected.push(entry.key().clone());
                    }
                }
            }
        }
        self.handlers.retain(|_, list| !list.is_empty());
        affected.sort();
        if !affected.is_empty() {
            debug!(triggers = ?affected, "Unregistered handlers");
        }
        affected
    }

    /// Trigger keys with at least one handler, sorted.
    pub fn triggers(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.handlers.iter().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("triggers", &self.triggers())
            .field("handlers", &self.len())
            .finish()
    }
}
