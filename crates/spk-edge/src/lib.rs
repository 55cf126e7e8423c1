//! spk-edge library target.
//!
//! Exposes the guard, cookie policy, router, and state for integration
//! tests. The binary `main.rs` depends on this library target.

pub mod api_types;
pub mod cookies;
pub mod guard;
pub mod routes;
pub mod state;
