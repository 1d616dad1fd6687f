//! Core building blocks for the MT5 gRPC bridge
//!
//! This crate provides everything below the RPC surface:
//! - The `TerminalModule` capability the bridge consumes
//! - Lazy, thread-safe loading of that module
//! - Marshaling of native results into wire-safe forms
//! - Parameter validation helpers
//! - The named-constant catalogue

pub mod constants;
pub mod errors;
pub mod loader;
pub mod marshal;
pub mod module;
pub mod native;
pub mod validate;

#[cfg(any(test, feature = "testkit"))]
pub mod testing;

pub use errors::*;
pub use loader::*;
pub use module::*;
