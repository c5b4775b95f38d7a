//! Reference data: coordination policies and precedent cases.
//!
//! Loaded once at process start and read-only afterwards. The context
//! assembler retrieves a small bounded subset per turn so the prompt stays
//! within its token budget.

mod library;

pub use library::{
    CaseExample, PolicyCategory, PolicyRule, PolicySeverity, ReferenceLibrary, MAX_CASES_PER_TURN,
    MAX_POLICIES_PER_TURN,
};
