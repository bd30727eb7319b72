//! Session lifecycle: state, controller, registry, summaries.

pub mod controller;
pub mod registry;
pub mod state;
pub mod summary;

pub use controller::{SessionBackends, SessionConfig, SessionController};
pub use registry::SessionRegistry;
pub use state::{CostBreakdown, SessionState, TimingSample};
pub use summary::{Providers, SessionSummary};
