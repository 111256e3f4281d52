use crate::capability::Capability;
use crate::host::{Factory, UiHost};
use std::collections::HashMap;
use std::fmt;

pub trait CapabilityCatalog {
    fn capability(&self, kind: &str) -> Option<&Capability>;
}

pub struct RegistryEntry<H: UiHost> {
    pub factory: Factory<H>,
    pub capability: Capability,
}

impl<H: UiHost> Clone for RegistryEntry<H> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            capability: self.capability.clone(),
        }
    }
}

impl<H: UiHost> fmt::Debug for RegistryEntry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

pub struct CapabilityRegistry<H: UiHost> {
    entries: HashMap<String, RegistryEntry<H>>,
}

impl<H: UiHost> CapabilityRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts or replaces the entry for `kind`. Last write wins; a
    /// replacement is logged and reported through the return value.
    pub fn register(&mut self, kind: impl Into<String>, factory: Factory<H>, capability: Capability) -> bool {
        let kind = kind.into();
        if capability.name != kind {
            tracing::debug!(%kind, capability = %capability.name, "capability name differs from registered type");
        }

        let replaced = self
            .entries
            .insert(kind.clone(), RegistryEntry { factory, capability })
            .is_some();

        if replaced {
            tracing::warn!(%kind, "replacing registered component type");
        } else {
            tracing::debug!(%kind, "registered component type");
        }

        replaced
    }

    pub fn get(&self, kind: &str) -> Option<&RegistryEntry<H>> {
        self.entries.get(kind)
    }

    pub fn has(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    pub fn get_capability(&self, kind: &str) -> Option<&Capability> {
        self.entries.get(kind).map(|entry| &entry.capability)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.entries.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn unregister(&mut self, kind: &str) -> bool {
        self.entries.remove(kind).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<H: UiHost> Default for CapabilityRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: UiHost> fmt::Debug for CapabilityRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl<H: UiHost> CapabilityCatalog for CapabilityRegistry<H> {
    fn capability(&self, kind: &str) -> Option<&Capability> {
        self.get_capability(kind)
    }
}
