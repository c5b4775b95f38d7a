//! Turn executor - runs one conversation turn.
//!
//! Pipeline per turn: assemble context → build prompt → invoke the model
//! with a bounded timeout → parse its structured output → let the policy
//! guard correct it → validate the proposed phase against the graph →
//! merge extracted fields → append the response.
//!
//! The executor is the only component allowed to advance the phase. It
//! never retries the model call; transport failures and malformed output
//! degrade to a fixed fallback utterance with the phase held.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::foundation::business_today;
use crate::ports::{ChatRole, CompletionRequest, ModelProvider};

use super::context::ContextAssembler;
use super::guard::PolicyGuard;
use super::message::MessageRole;
use super::phase::ConversationPhase;
use super::prompt::build_prompt;
use super::session::ConversationSession;
use super::turn::{TurnMetadata, TurnOutput};

/// Safe utterance used whenever the model output is unusable.
pub const FALLBACK_RESPONSE: &str = "Disculpe, ¿podría repetir por favor?";

/// Synthetic first message for outbound calls: the model must open the
/// conversation before the customer has said anything.
const OUTBOUND_START_MARKER: &str =
    "[SYSTEM: Inicia la llamada saliente. Genera el saludo inicial.]";

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Sampling temperature; low for consistency.
    pub temperature: f32,
    /// Bounded output length.
    pub max_tokens: u32,
    /// Model call timeout. A timeout is a recoverable failure.
    pub timeout: Duration,
    /// How many recent history messages accompany the prompt.
    pub history_window: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1000,
            timeout: Duration::from_secs(30),
            history_window: 20,
        }
    }
}

/// Result of executing one turn against a session.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub agent_response: String,
    pub metadata: TurnMetadata,
}

/// Executes conversation turns. Holds no per-session state; sessions are
/// passed in and mutated, persistence belongs to the caller.
pub struct TurnExecutor {
    provider: Arc<dyn ModelProvider>,
    assembler: ContextAssembler,
    guard: PolicyGuard,
    options: ExecutorOptions,
}

impl TurnExecutor {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        assembler: ContextAssembler,
        guard: PolicyGuard,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            provider,
            assembler,
            guard,
            options,
        }
    }

    /// Executes one turn: user message in, agent response out, session
    /// mutated. The caller persists the session afterwards.
    pub async fn execute(
        &self,
        session: &mut ConversationSession,
        user_message: &str,
    ) -> TurnResult {
        session.append_message(MessageRole::User, user_message);

        let phase_before = session.phase;
        let raw = match self.invoke_model(session, user_message).await {
            Ok(raw) => raw,
            Err(reason) => {
                warn!(
                    session_id = %session.session_id,
                    phase = %phase_before,
                    %reason,
                    "model call failed, using fallback response"
                );
                return self.fallback_turn(session);
            }
        };

        let output = match TurnOutput::parse(&raw) {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    session_id = %session.session_id,
                    phase = %phase_before,
                    error = %err,
                    "model output unparseable, using fallback response"
                );
                return self.fallback_turn(session);
            }
        };

        // Merge first so data declared this turn (e.g. the contact's age)
        // is visible to the guard.
        session.apply_extracted(&output.extracted);

        let verdict = self.guard.evaluate(session, user_message, output);
        let mut metadata = TurnMetadata {
            guard_overridden: verdict.overridden,
            ..TurnMetadata::default()
        };
        let output = verdict.output;

        // The phase model is the sole authority on transitions: validate,
        // then commit. An illegal proposal holds the phase and is logged
        // as model drift.
        let next_phase = output.next_phase;
        if next_phase != phase_before {
            if session.transition_to(next_phase).is_err() {
                metadata.illegal_transition_rejected = true;
                warn!(
                    session_id = %session.session_id,
                    from = %phase_before,
                    proposed = %next_phase,
                    "illegal phase transition proposed by model, holding phase"
                );
            }
        }
        self.apply_transition_side_effects(session, phase_before);

        if output.requires_escalation {
            session.raise_escalation(output.escalation_reason.clone().unwrap_or_default());
        }
        metadata.escalation_reason = session.escalation_reason.clone();

        session.append_message(MessageRole::Assistant, output.agent_response.clone());
        if session.increment_turn().is_err() {
            warn!(session_id = %session.session_id, "turn limit reached");
        }

        info!(
            session_id = %session.session_id,
            from = %phase_before,
            to = %session.phase,
            escalation = session.requires_escalation,
            "turn executed"
        );

        TurnResult {
            agent_response: output.agent_response,
            metadata,
        }
    }

    /// Generates the opening message of an outbound call, before any user
    /// input exists. Falls back to a template greeting built from the
    /// preloaded record when the model output is unusable.
    pub async fn initiate_outbound(&self, session: &mut ConversationSession) -> TurnResult {
        let greeting = match self.invoke_model(session, OUTBOUND_START_MARKER).await {
            Ok(raw) => match TurnOutput::parse(&raw) {
                Ok(output) => output.agent_response,
                Err(_) => template_greeting(session),
            },
            Err(_) => template_greeting(session),
        };

        session.append_message(MessageRole::Assistant, greeting.clone());
        if session.increment_turn().is_err() {
            warn!(session_id = %session.session_id, "turn limit reached");
        }

        TurnResult {
            agent_response: greeting,
            metadata: TurnMetadata::default(),
        }
    }

    /// Builds and sends the completion request; flattens transport errors
    /// and timeouts into a printable reason.
    async fn invoke_model(
        &self,
        session: &ConversationSession,
        user_message: &str,
    ) -> Result<String, String> {
        let context = self
            .assembler
            .assemble(session, user_message, business_today());
        let system_prompt = build_prompt(session.phase, &context, session);

        let mut request = CompletionRequest::new(system_prompt)
            .with_temperature(self.options.temperature)
            .with_max_tokens(self.options.max_tokens);

        let start = session
            .messages
            .len()
            .saturating_sub(self.options.history_window);
        for entry in &session.messages[start..] {
            let role = match entry.role {
                MessageRole::User => ChatRole::User,
                MessageRole::Assistant => ChatRole::Assistant,
                MessageRole::System => continue,
            };
            request = request.with_message(role, entry.content.clone());
        }
        if session.messages.is_empty() {
            // Outbound initiation: no history yet, send the start marker
            request = request.with_message(ChatRole::User, user_message);
        }

        let timeout_secs = self.options.timeout.as_secs() as u32;
        match tokio::time::timeout(self.options.timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err(format!("model call timed out after {}s", timeout_secs)),
        }
    }

    /// Appends the fallback utterance and holds the phase.
    fn fallback_turn(&self, session: &mut ConversationSession) -> TurnResult {
        session.append_message(MessageRole::Assistant, FALLBACK_RESPONSE);
        if session.increment_turn().is_err() {
            warn!(session_id = %session.session_id, "turn limit reached");
        }
        TurnResult {
            agent_response: FALLBACK_RESPONSE.to_string(),
            metadata: TurnMetadata {
                parse_error: true,
                ..TurnMetadata::default()
            },
        }
    }

    /// Acknowledgement flags tied to specific committed transitions.
    fn apply_transition_side_effects(
        &self,
        session: &mut ConversationSession,
        phase_before: ConversationPhase,
    ) {
        use ConversationPhase::*;
        match (phase_before, session.phase) {
            (LegalNotice, ServiceCoordination)
            | (OutboundLegalNotice, OutboundServiceConfirmation)
            | (OutboundLegalNotice, OutboundSpecialCases) => {
                session.legal_notice_acknowledged = true;
            }
            (Survey, End) => {
                session.survey_completed = true;
            }
            _ => {}
        }
    }
}

/// Deterministic greeting used when the model cannot open the call.
fn template_greeting(session: &ConversationSession) -> String {
    let patient = session
        .patient
        .full_name
        .as_deref()
        .unwrap_or("el paciente");
    let service = session
        .service
        .service_type
        .as_deref()
        .unwrap_or("transporte médico");
    format!(
        "{greeting}, ¿hablo con {patient}? Le llamo de {company} para confirmar su servicio \
         de {service}.",
        greeting = crate::domain::foundation::greeting(),
        patient = patient,
        company = session.profile.company_name,
        service = service,
    )
}
