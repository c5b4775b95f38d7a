//! Conversation domain - the call coordination state machine.
//!
//! The modules here cover one conversation end to end: the phase graph,
//! the session aggregate, typed extraction, context assembly, prompt
//! composition, the policy guard, and the turn executor that ties them
//! together.

mod context;
mod engine;
mod extraction;
mod guard;
mod message;
mod phase;
mod prompt;
mod session;
mod turn;

pub use context::{format_appointment_date, AssembledContext, ContextAssembler};
pub use engine::{ExecutorOptions, TurnExecutor, TurnResult, FALLBACK_RESPONSE};
pub use extraction::{ExtractedFields, IdentityUpdate, OperationalUpdate, ServiceUpdate};
pub use guard::{GuardAlert, GuardConfig, GuardVerdict, PolicyGuard};
pub use message::{MessageEntry, MessageRole};
pub use phase::{CallDirection, ConversationPhase};
pub use prompt::{build_prompt, phase_instructions};
pub use session::{
    AgentProfile, ConfirmationStatus, ContactInfo, ConversationSession, Incident, Observation,
    PatientIdentity, ServiceDetails, ServiceRecordSeed,
};
pub use turn::{TurnMetadata, TurnOutput, TurnParseError, TurnRequest, TurnResponse};
