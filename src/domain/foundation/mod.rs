//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, error types, and the state machine
//! trait that form the vocabulary of the medroute domain.

mod errors;
mod ids;
mod localtime;
mod state_machine;

pub use errors::ValidationError;
pub use ids::SessionId;
pub use localtime::{business_now, business_today, farewell, greeting, time_of_day, TimeOfDay};
pub use state_machine::StateMachine;
