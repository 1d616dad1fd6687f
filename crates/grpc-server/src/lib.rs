//! gRPC bridge server for the MT5 terminal
//!
//! Exposes the native trading module to Linux-side clients as a
//! request/response RPC surface: one method per native capability,
//! each validating its inputs, delegating to the module, and marshaling
//! the result into a wire-safe form.

pub mod conversions;
pub mod server;
pub mod service;

// Re-export proto types
pub mod proto {
    include!("generated/mt5.rs");
}

pub use server::{BridgeServer, BridgeServerConfig};
pub use service::Mt5BridgeService;
