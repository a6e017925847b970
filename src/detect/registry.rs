use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::{DetectionCapability, PerceptionBackend};

pub type SharedBackend = Arc<Mutex<dyn PerceptionBackend>>;

/// Thread-safe registry of perception backends.
///
/// Backends are wrapped in `Mutex` because inference takes `&mut self`.
pub struct BackendRegistry {
    backends: HashMap<String, SharedBackend>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: PerceptionBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<SharedBackend> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<SharedBackend> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }

    /// Select a backend that supports the requested capability.
    ///
    /// Prefers the default backend when it supports the capability.
    pub fn backend_for_capability(&self, capability: DetectionCapability) -> Result<SharedBackend> {
        if let Some(default_backend) = self.default_backend() {
            let supports = {
                let guard = default_backend
                    .lock()
                    .map_err(|_| anyhow!("default backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(default_backend);
            }
        }

        for name in self.list() {
            let Some(backend) = self.get(&name) else {
                continue;
            };
            let supports = {
                let guard = backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?;
                guard.supports(capability)
            };
            if supports {
                return Ok(backend);
            }
        }

        Err(anyhow!(
            "no registered backend supports capability {:?}",
            capability
        ))
    }

    /// Run every backend's warm-up hook.
    pub fn warm_up_all(&self) -> Result<()> {
        for name in self.list() {
            if let Some(backend) = self.get(&name) {
                backend
                    .lock()
                    .map_err(|_| anyhow!("backend lock poisoned"))?
                    .warm_up()
                    .map_err(|e| anyhow!("backend '{}' warm-up failed: {}", name, e))?;
            }
        }
        Ok(())
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;

    struct LinesOnly;

    impl PerceptionBackend for LinesOnly {
        fn name(&self) -> &'static str {
            "lines"
        }

        fn supports(&self, capability: DetectionCapability) -> bool {
            capability == DetectionCapability::LineSegments
        }
    }

    #[test]
    fn default_backend_preferred_when_capable() {
        let mut registry = BackendRegistry::new();
        registry.register(LinesOnly);
        registry.register(StubBackend::new());
        let backend = registry
            .backend_for_capability(DetectionCapability::LineSegments)
            .unwrap();
        assert_eq!(backend.lock().unwrap().name(), "lines");
    }

    #[test]
    fn falls_back_to_any_capable_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(LinesOnly);
        registry.register(StubBackend::new());
        let backend = registry
            .backend_for_capability(DetectionCapability::PoseEstimation)
            .unwrap();
        assert_eq!(backend.lock().unwrap().name(), "stub");
    }

    #[test]
    fn missing_capability_is_an_error() {
        let mut registry = BackendRegistry::new();
        registry.register(LinesOnly);
        assert!(registry
            .backend_for_capability(DetectionCapability::PoseEstimation)
            .is_err());
        assert!(registry.set_default("onnx").is_err());
        assert!(registry.warm_up_all().is_ok());
    }
}
