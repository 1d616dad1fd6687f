//! Production module factory: dynamic library loading
//!
//! The Wine-side build ships the terminal binding as a cdylib plugin
//! compiled against this crate. It exports a single entry symbol that
//! hands over an owned `Arc<dyn TerminalModule>`; everything after that
//! goes through the trait.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::info;

use crate::errors::{BridgeError, BridgeResult};
use crate::loader::ModuleFactory;
use crate::module::TerminalModule;

/// Entry symbol every module plugin must export.
///
/// Returns a pointer obtained from `Box::into_raw(Box::new(arc))`, or
/// null when the terminal binding cannot come up.
pub const MODULE_ENTRY_SYMBOL: &[u8] = b"mt5_module_entry";

type ModuleEntry = unsafe extern "C" fn() -> *mut Arc<dyn TerminalModule>;

/// Load the module plugin at `path` and take ownership of its handle.
///
/// All failures surface as `ModuleUnavailable` with the underlying
/// reason, the one failure mode the RPC surface propagates.
pub fn load_library_module(path: &Path) -> BridgeResult<Arc<dyn TerminalModule>> {
    info!("opening native module library {}", path.display());

    let library = unsafe { Library::new(path) }.map_err(|e| {
        BridgeError::ModuleUnavailable(format!("failed to open {}: {e}", path.display()))
    })?;

    let entry: Symbol<'_, ModuleEntry> =
        unsafe { library.get(MODULE_ENTRY_SYMBOL) }.map_err(|e| {
            BridgeError::ModuleUnavailable(format!(
                "{} does not export a module entry point: {e}",
                path.display()
            ))
        })?;

    let raw = unsafe { entry() };
    if raw.is_null() {
        return Err(BridgeError::ModuleUnavailable(format!(
            "{}: module entry point reported initialization failure",
            path.display()
        )));
    }
    let module = *unsafe { Box::from_raw(raw) };

    // The handle lives until process exit and is never reloaded; keep
    // the library mapped so its symbols stay valid.
    std::mem::forget(library);

    Ok(module)
}

/// Factory deferring the library load to first use.
pub fn library_factory(path: PathBuf) -> ModuleFactory {
    Box::new(move || load_library_module(&path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_is_module_unavailable() {
        let err = load_library_module(Path::new("/nonexistent/libmt5native.so"))
            .err()
            .unwrap();
        match err {
            BridgeError::ModuleUnavailable(reason) => {
                assert!(reason.contains("/nonexistent/libmt5native.so"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
