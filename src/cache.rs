use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::config::ApplianceConfiguration;
use crate::controls::{CompileError, Control, compile};

/// Compiled controls per appliance instance.
///
/// Hosts hold on to the composite controls they were handed, so an appliance keeps the very
/// same controls until it is [forgotten](ControlCache::forget).
#[derive(Default)]
pub struct ControlCache {
    compiled: Mutex<BTreeMap<String, Arc<[Control]>>>,
}

impl ControlCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile(
        &self,
        instance: &str,
        config: &ApplianceConfiguration,
    ) -> Result<Arc<[Control]>, CompileError> {
        if let Some(controls) = self.get(instance) {
            trace!(instance, "compiled controls cache hit");
            return Ok(controls);
        }
        let controls: Arc<[Control]> = compile(config)?.into();
        let mut guard = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        // Another caller may have compiled the same instance while the lock was released.
        Ok(Arc::clone(guard.entry(instance.to_string()).or_insert(controls)))
    }

    pub fn get(&self, instance: &str) -> Option<Arc<[Control]>> {
        let guard = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(instance).cloned()
    }

    /// Drop the controls of an appliance that is no longer managed.
    pub fn forget(&self, instance: &str) -> Option<Arc<[Control]>> {
        let mut guard = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        guard.remove(instance)
    }
}
