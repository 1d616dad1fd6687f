//! Lazy, process-wide loading of the native trading module
//!
//! The module handle is the only piece of shared mutable state in the
//! bridge. It is acquired at most once, on first use, and never
//! reassigned afterwards; a failed load leaves the slot empty so the
//! next call retries.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::{BridgeError, BridgeResult};
use crate::module::TerminalModule;

/// Produces a loaded module handle, or the reason it could not be
/// loaded. Injected at construction so the production dynamic-library
/// path and test doubles share the same loader.
pub type ModuleFactory =
    Box<dyn Fn() -> BridgeResult<Arc<dyn TerminalModule>> + Send + Sync>;

/// Process-wide holder for the lazily-loaded module handle.
pub struct ModuleLoader {
    factory: ModuleFactory,
    slot: RwLock<Option<Arc<dyn TerminalModule>>>,
}

impl ModuleLoader {
    pub fn new(factory: ModuleFactory) -> Self {
        Self {
            factory,
            slot: RwLock::new(None),
        }
    }

    /// Loader whose module is already present. Used by tests and by
    /// embedders that construct the module themselves.
    pub fn preloaded(module: Arc<dyn TerminalModule>) -> Self {
        let loader = Self::new(Box::new({
            let module = Arc::clone(&module);
            move || Ok(Arc::clone(&module))
        }));
        *loader.slot.write() = Some(module);
        loader
    }

    /// Return the loaded module handle, loading it on first use.
    ///
    /// Idempotent and thread-safe: the slot is checked under a read lock
    /// first, then re-checked under the write lock before the factory
    /// runs, so concurrent first callers perform exactly one load. The
    /// first call may block for the duration of native initialization,
    /// which under the compatibility layer is seconds rather than
    /// milliseconds; callers should budget their first-call timeout
    /// accordingly (>= 60s in a cold process).
    pub fn ensure_loaded(&self) -> BridgeResult<Arc<dyn TerminalModule>> {
        if let Some(module) = self.slot.read().as_ref() {
            return Ok(Arc::clone(module));
        }

        let mut slot = self.slot.write();
        // Re-check: another thread may have loaded while we waited.
        if let Some(module) = slot.as_ref() {
            return Ok(Arc::clone(module));
        }

        info!("loading native trading module");
        let module = (self.factory)().map_err(|e| {
            debug!("native module load failed: {e}");
            e
        })?;
        info!("native trading module loaded");
        *slot = Some(Arc::clone(&module));
        Ok(module)
    }

    /// The loaded handle, if any. Does not trigger a load.
    pub fn loaded(&self) -> Option<Arc<dyn TerminalModule>> {
        self.slot.read().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Helper for factories reporting an unavailable module.
    pub fn unavailable(reason: impl Into<String>) -> BridgeError {
        BridgeError::ModuleUnavailable(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::testing::MockModule;

    fn counting_loader(loads: Arc<AtomicUsize>) -> ModuleLoader {
        ModuleLoader::new(Box::new(move || {
            loads.fetch_add(1, Ordering::SeqCst);
            // Simulate a slow native import.
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Arc::new(MockModule::default()) as Arc<dyn TerminalModule>)
        }))
    }

    #[test]
    fn loads_exactly_once_under_contention() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(counting_loader(Arc::clone(&loads)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                std::thread::spawn(move || loader.ensure_loaded().is_ok())
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
    }

    #[test]
    fn repeated_calls_reuse_the_handle() {
        let loads = Arc::new(AtomicUsize::new(0));
        let loader = counting_loader(Arc::clone(&loads));

        for _ in 0..5 {
            loader.ensure_loaded().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_leaves_slot_empty_and_retries() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let loader = ModuleLoader::new(Box::new({
            let attempts = Arc::clone(&attempts);
            move || {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModuleLoader::unavailable("import failed"))
                } else {
                    Ok(Arc::new(MockModule::default()) as Arc<dyn TerminalModule>)
                }
            }
        }));

        let err = loader.ensure_loaded().err().unwrap();
        assert!(matches!(err, BridgeError::ModuleUnavailable(_)));
        assert!(!loader.is_loaded());

        assert!(loader.ensure_loaded().is_ok());
        assert!(loader.is_loaded());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn preloaded_never_invokes_factory() {
        let loader = ModuleLoader::preloaded(Arc::new(MockModule::default()));
        assert!(loader.is_loaded());
        assert!(loader.loaded().is_some());
        assert!(loader.ensure_loaded().is_ok());
    }
}
