//! Application layer - orchestration facade over the conversation core.

mod coordinator;

pub use coordinator::{CallCoordinator, CoordinatorError};
