//! Connection lifecycle management.
//!
//! The manager keeps at most one live realtime session matching the
//! current identity, recovers from unplanned drops with bounded
//! exponential backoff, and exposes its state to consumers.
//!
//! # Lifecycle
//!
//! ```text
//!             identity present
//!   Idle ───────────────────────► Connecting ──ok──► Connected
//!    ▲                              │    ▲              │
//!    │ deliberate close /           │    │ timer        │ unplanned
//!    │ identity absent /         fail    │ fires        │ drop
//!    │ missing credential           ▼    │              ▼
//!    │                           ReconnectWait ◄────────┘
//!    │                              │
//!    │                              │ budget spent
//!    └── reconnect() / identity ◄─ Failed
//!        change (from any state)
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Manager construction |
//! | `core` | Supervisor loop and public API |
//! | `state` | Observable phase and status snapshot |

// ============================================================================
// Submodules
// ============================================================================

/// Manager construction.
pub mod builder;

/// Supervisor loop and public API.
pub mod core;

/// Observable phase and status snapshot.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ManagerBuilder;
pub use core::ConnectionManager;
pub use state::{ConnectionState, Phase};
