//! Turn contract: what the model must return, and what a turn produces.
//!
//! The model is required to answer with a single JSON object. Providers do
//! not always comply cleanly (code fences, leading prose), so parsing first
//! isolates the outermost JSON object and then validates it strictly.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::extraction::ExtractedFields;
use super::phase::{CallDirection, ConversationPhase};
use crate::domain::foundation::SessionId;

/// Structured output the model must produce every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutput {
    /// Conversational reply spoken to the caller.
    pub agent_response: String,
    /// Proposed next phase. The phase model decides whether it is committed.
    pub next_phase: ConversationPhase,
    #[serde(default)]
    pub requires_escalation: bool,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    /// Fields the turn actually discussed; merged, never replacing whole
    /// sub-records. Models occasionally emit an explicit `null` here; both
    /// absent and null mean "nothing extracted".
    #[serde(default, deserialize_with = "extracted_or_default")]
    pub extracted: ExtractedFields,
}

fn extracted_or_default<'de, D>(deserializer: D) -> Result<ExtractedFields, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<ExtractedFields>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Why a raw model reply could not be turned into a [`TurnOutput`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurnParseError {
    #[error("no JSON object found in model output")]
    NoJsonObject,

    #[error("model output does not match the turn schema: {0}")]
    SchemaMismatch(String),

    #[error("agent_response is empty")]
    EmptyResponse,
}

impl TurnOutput {
    /// Parses a raw model reply.
    ///
    /// Accepts fenced blocks and stray prose around the object, but the
    /// object itself is validated strictly (unknown extraction keys are
    /// rejected).
    pub fn parse(raw: &str) -> Result<Self, TurnParseError> {
        let candidate = extract_json_object(raw).ok_or(TurnParseError::NoJsonObject)?;
        let output: TurnOutput = serde_json::from_str(candidate)
            .map_err(|e| TurnParseError::SchemaMismatch(e.to_string()))?;
        if output.agent_response.trim().is_empty() {
            return Err(TurnParseError::EmptyResponse);
        }
        Ok(output)
    }
}

/// Returns the outermost `{ ... }` slice of the input, if any.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&raw[start..=end])
}

/// One incoming turn request, as received from the calling layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: SessionId,
    pub message: String,
}

/// The caller-visible result of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub session_id: SessionId,
    pub agent_response: String,
    pub phase: ConversationPhase,
    pub direction: CallDirection,
    pub requires_escalation: bool,
    pub metadata: TurnMetadata,
}

/// Diagnostic metadata attached to a turn response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMetadata {
    /// Model output could not be parsed; the fallback utterance was used.
    pub parse_error: bool,
    /// The policy guard rewrote the model's proposal.
    pub guard_overridden: bool,
    /// The model proposed an undeclared transition that was rejected.
    pub illegal_transition_rejected: bool,
    pub escalation_reason: Option<String>,
}
