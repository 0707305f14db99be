//! Memoized descriptor cache.
//!
//! Write-once-per-service, read on every invocation. The registry is an
//! explicit value owned by the dispatcher, not process-global state.

use super::ServiceDescriptor;
use crate::error::Error;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct DescriptorRegistry {
    inner: RwLock<HashMap<String, Arc<ServiceDescriptor>>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for `name`, collecting it with `collect`
    /// on first use. Re-collection for an already-registered service is a
    /// no-op that returns the cached value.
    pub fn resolve<F>(&self, name: &str, collect: F) -> Result<Arc<ServiceDescriptor>, Error>
    where
        F: FnOnce() -> Result<ServiceDescriptor, Error>,
    {
        if let Some(existing) = self.get(name) {
            return Ok(existing);
        }
        let descriptor = Arc::new(collect()?);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        // A racing writer may have won; keep the first registration.
        Ok(guard
            .entry(name.to_string())
            .or_insert(descriptor)
            .clone())
    }

    pub fn register(&self, descriptor: ServiceDescriptor) -> Arc<ServiceDescriptor> {
        let name = descriptor.name.clone();
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard
            .entry(name)
            .or_insert_with(|| Arc::new(descriptor))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ServiceDescriptor>> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodBuilder, ServiceBuilder};

    fn sample(name: &str) -> ServiceDescriptor {
        ServiceBuilder::new(name)
            .method(MethodBuilder::new("list").get("/items").returns("list<Item>"))
            .build()
            .unwrap()
    }

    #[test]
    fn re_registration_keeps_first_descriptor() {
        let registry = DescriptorRegistry::new();
        let first = registry.register(sample("Items"));
        let second = registry.register(sample("Items"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn resolve_collects_once() {
        let registry = DescriptorRegistry::new();
        let mut calls = 0;
        for _ in 0..3 {
            registry
                .resolve("Items", || {
                    calls += 1;
                    Ok(sample("Items"))
                })
                .unwrap();
        }
        assert_eq!(calls, 1);
    }
}
