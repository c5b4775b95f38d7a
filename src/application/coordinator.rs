//! Call coordinator - the application facade over the turn executor.
//!
//! Owns session lifecycle around each turn: load-or-create for inbound
//! calls, record-seeded creation for outbound calls, persistence after
//! every turn, and outcome write-back when an outbound call ends.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::domain::conversation::{
    AgentProfile, CallDirection, ConversationSession, TurnExecutor, TurnMetadata, TurnResponse,
};
use crate::domain::foundation::SessionId;
use crate::ports::{RecordError, ServiceRecordSource, SessionStore, StoreError};

/// Spoken when a turn arrives for a conversation that already ended.
const SESSION_CLOSED_RESPONSE: &str =
    "La conversación ya finalizó. Gracias por comunicarse con nosotros.";

/// Coordinator errors surfaced to the calling layer.
///
/// Everything else (model failures, malformed output, illegal transitions)
/// is recovered inside the turn executor and never reaches the caller.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("session not found: {session_id}")]
    SessionNotFound { session_id: SessionId },

    #[error("no pending service record for phone {phone}")]
    RecordNotFound { phone: String },

    #[error("service record source is not configured")]
    RecordsUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record source error: {0}")]
    Records(String),
}

impl From<RecordError> for CoordinatorError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound { phone } => CoordinatorError::RecordNotFound { phone },
            RecordError::Backend(msg) => CoordinatorError::Records(msg),
        }
    }
}

/// Orchestrates inbound and outbound calls.
pub struct CallCoordinator {
    executor: TurnExecutor,
    store: Arc<dyn SessionStore>,
    records: Option<Arc<dyn ServiceRecordSource>>,
    profile: AgentProfile,
}

impl CallCoordinator {
    pub fn new(
        executor: TurnExecutor,
        store: Arc<dyn SessionStore>,
        records: Option<Arc<dyn ServiceRecordSource>>,
        profile: AgentProfile,
    ) -> Self {
        Self {
            executor,
            store,
            records,
            profile,
        }
    }

    /// Creates and persists a fresh inbound session.
    pub async fn start_inbound(&self) -> Result<ConversationSession, CoordinatorError> {
        let session = ConversationSession::new_inbound(self.profile.clone());
        self.store.save(&session).await?;
        info!(session_id = %session.session_id, "inbound session created");
        Ok(session)
    }

    /// Starts an outbound confirmation call for a phone number: loads the
    /// service record, creates the preloaded session, and generates the
    /// opening message.
    ///
    /// An unknown phone surfaces as [`CoordinatorError::RecordNotFound`].
    pub async fn start_outbound(&self, phone: &str) -> Result<TurnResponse, CoordinatorError> {
        let records = self
            .records
            .as_ref()
            .ok_or(CoordinatorError::RecordsUnavailable)?;
        let seed = records.find_by_phone(phone).await?;

        let mut session = ConversationSession::new_outbound(self.profile.clone(), seed);
        let result = self.executor.initiate_outbound(&mut session).await;
        self.store.save(&session).await?;

        info!(
            session_id = %session.session_id,
            phone = phone,
            "outbound session created"
        );
        Ok(build_response(&session, result.agent_response, result.metadata))
    }

    /// Processes one user message for an existing session.
    ///
    /// A missing session is a new-session condition for inbound calls; for
    /// outbound calls it is a hard error, since identity and service data
    /// cannot be fabricated.
    pub async fn handle_message(
        &self,
        session_id: &SessionId,
        direction: CallDirection,
        message: &str,
    ) -> Result<TurnResponse, CoordinatorError> {
        let mut session = match self.store.get(session_id).await? {
            Some(session) => session,
            None => match direction {
                CallDirection::Inbound => {
                    let mut session = ConversationSession::new_inbound(self.profile.clone());
                    session.session_id = *session_id;
                    info!(session_id = %session_id, "missing inbound session recreated");
                    session
                }
                CallDirection::Outbound => {
                    return Err(CoordinatorError::SessionNotFound {
                        session_id: *session_id,
                    });
                }
            },
        };

        if !session.can_accept_turn() {
            warn!(session_id = %session_id, "turn received for closed session");
            return Ok(build_response(
                &session,
                SESSION_CLOSED_RESPONSE.to_string(),
                TurnMetadata::default(),
            ));
        }

        let result = self.executor.execute(&mut session, message).await;

        if session.is_ended() && session.direction.is_outbound() {
            self.write_back_outcome(&session).await;
        }

        self.store.save(&session).await?;
        Ok(build_response(&session, result.agent_response, result.metadata))
    }

    /// Writes the final confirmation status and an observation summary to
    /// the service record. Failures are logged, not surfaced: the call
    /// itself completed.
    async fn write_back_outcome(&self, session: &ConversationSession) {
        let (Some(records), Some(row)) = (self.records.as_ref(), session.record_row) else {
            return;
        };

        let observations = outcome_observations(session);
        if let Err(err) = records
            .update_outcome(row, session.confirmation_status, &observations)
            .await
        {
            warn!(
                session_id = %session.session_id,
                row = row,
                error = %err,
                "service record write-back failed"
            );
        }
    }
}

fn build_response(
    session: &ConversationSession,
    agent_response: String,
    metadata: TurnMetadata,
) -> TurnResponse {
    TurnResponse {
        session_id: session.session_id,
        agent_response,
        phase: session.phase,
        direction: session.direction,
        requires_escalation: session.requires_escalation,
        metadata,
    }
}

/// Builds the observation line written back to the service record.
fn outcome_observations(session: &ConversationSession) -> String {
    let mut parts = vec!["Llamada completada".to_string()];

    if session.service_confirmed {
        parts.push("Servicio confirmado".to_string());
    }
    if session.date_change_requested {
        if let Some(date) = session.new_appointment_date.as_deref() {
            parts.push(format!("Fecha reprogramada: {}", date));
        } else {
            parts.push("Solicita reprogramación".to_string());
        }
    }
    if session.patient_away {
        match session.patient_return_date.as_deref() {
            Some(date) => parts.push(format!("Paciente fuera, regresa: {}", date)),
            None => parts.push("Paciente fuera de la ciudad".to_string()),
        }
    }
    if session.wrong_number {
        parts.push("Número equivocado".to_string());
    }
    for need in &session.special_needs {
        parts.push(format!("Necesidad especial: {}", need));
    }
    for incident in &session.incidents {
        parts.push(format!("Incidencia: {}", incident.summary));
    }
    if session.requires_escalation {
        if let Some(reason) = session.escalation_reason.as_deref() {
            parts.push(format!("Escalamiento: {}", reason));
        }
    }

    parts.join(" - ")
}
