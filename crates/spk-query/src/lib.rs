//! Query-state model, codec, and synchronizer for SignalPick.
//!
//! Three layers, each building on the previous:
//!
//! - [`state`] — [`QueryState`], the structural invariant between `models`
//!   and `conditions`, and the [`QueryPatch`] partial-update type.
//! - [`codec`] — total decode / canonical encode between `QueryState` and
//!   the query string. The **same** codec runs in the edge guard, which is
//!   what keeps both contexts in bit-for-bit agreement.
//! - [`sync`] — the client-side synchronizer: single owner of the state,
//!   trailing-edge debounce cell, navigate-only-on-change.

pub mod codec;
pub mod state;
pub mod sync;

pub use state::{Joiner, Patch, QueryPatch, QueryState, DEFAULT_PAGE_SIZE};
pub use sync::{NavigationSink, QueryStateSync, DEBOUNCE_DELAY};
