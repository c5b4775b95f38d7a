//! Conversation session aggregate.
//!
//! One session per active call, keyed by [`SessionId`]. The session is the
//! only mutable record of a conversation: identity and service data, the
//! append-only message history, operational flags, and the turn counter.
//!
//! Merge invariant: once a field is populated it is never silently cleared.
//! Only an explicit new value from the current turn may replace it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::foundation::{SessionId, StateMachine, ValidationError};

use super::extraction::{non_empty, ExtractedFields};
use super::message::{MessageEntry, MessageRole};
use super::phase::{CallDirection, ConversationPhase};

/// Outcome of an outbound confirmation call, written back to the service
/// record at the end of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    #[default]
    Pendiente,
    Confirmado,
    Reprogramar,
    Rechazado,
    #[serde(rename = "No contesta")]
    NoContesta,
    #[serde(rename = "Zona sin cobertura")]
    ZonaSinCobertura,
}

impl ConfirmationStatus {
    /// Display string as written to the service record.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pendiente => "Pendiente",
            Self::Confirmado => "Confirmado",
            Self::Reprogramar => "Reprogramar",
            Self::Rechazado => "Rechazado",
            Self::NoContesta => "No contesta",
            Self::ZonaSinCobertura => "Zona sin cobertura",
        }
    }
}

impl std::fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient identity data, filled during identification or preloaded from
/// the service record for outbound calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientIdentity {
    pub full_name: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub eps: Option<String>,
    pub phone: Option<String>,
}

/// Scheduled service data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetails {
    pub service_type: Option<String>,
    pub treatment_type: Option<String>,
    pub frequency: Option<String>,
    /// Possibly comma-separated for recurring services.
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub pickup_address: Option<String>,
    pub destination: Option<String>,
    pub transport_modality: Option<String>,
    pub companion_count: Option<u8>,
}

/// The person actually answering the call, when not the patient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub relationship: Option<String>,
    pub age: Option<u8>,
    /// Set once an authorized adult has been identified on the line.
    pub adult_confirmed: bool,
}

impl ContactInfo {
    /// Returns true when the declared contact is under 18.
    pub fn is_minor(&self) -> bool {
        self.age.is_some_and(|a| a < 18)
    }
}

/// A reported incident, appended during the call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// A free-text observation, appended with a timestamp and never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Flat field mapping supplied by the service-record source for outbound
/// calls. The core does not care where it came from (spreadsheet, API).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecordSeed {
    pub phone: String,
    pub patient: PatientIdentity,
    pub service: ServiceDetails,
    pub contact_name: Option<String>,
    pub contact_relationship: Option<String>,
    pub special_observations: Option<String>,
    /// Opaque row handle for outcome write-back.
    pub record_row: Option<usize>,
}

/// Per-session conversation profile (who the agent claims to be).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_name: String,
    pub company_name: String,
    pub eps_name: String,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            agent_name: "María".to_string(),
            company_name: "Transformas".to_string(),
            eps_name: "Cosalud".to_string(),
        }
    }
}

const DEFAULT_MAX_TURNS: u32 = 50;

/// Conversation session aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub session_id: SessionId,
    pub direction: CallDirection,
    pub phase: ConversationPhase,
    pub profile: AgentProfile,

    pub patient: PatientIdentity,
    pub service: ServiceDetails,
    pub contact: ContactInfo,

    pub messages: Vec<MessageEntry>,
    pub incidents: Vec<Incident>,
    pub observations: Vec<Observation>,

    pub requires_escalation: bool,
    pub escalation_reason: Option<String>,
    pub legal_notice_acknowledged: bool,
    pub survey_completed: bool,

    pub confirmation_status: ConfirmationStatus,
    pub service_confirmed: bool,
    pub date_change_requested: bool,
    pub new_appointment_date: Option<String>,
    pub patient_away: bool,
    pub patient_return_date: Option<String>,
    pub wrong_number: bool,
    pub coverage_issue: bool,
    pub special_needs: Vec<String>,

    pub record_row: Option<usize>,
    pub turn_count: u32,
    pub max_turns: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationSession {
    /// Creates a fresh inbound session in the greeting phase.
    pub fn new_inbound(profile: AgentProfile) -> Self {
        Self::new(CallDirection::Inbound, profile)
    }

    /// Creates an outbound session preloaded with service-record data.
    pub fn new_outbound(profile: AgentProfile, seed: ServiceRecordSeed) -> Self {
        let mut session = Self::new(CallDirection::Outbound, profile);
        session.patient = seed.patient;
        session.patient.phone = Some(seed.phone);
        session.service = seed.service;
        session.contact.name = seed.contact_name;
        session.contact.relationship = seed.contact_relationship;
        session.record_row = seed.record_row;
        if let Some(obs) = non_empty(&seed.special_observations) {
            let obs = obs.to_string();
            session.append_observation(obs);
        }
        session
    }

    fn new(direction: CallDirection, profile: AgentProfile) -> Self {
        let now = Utc::now();
        Self {
            session_id: SessionId::new(),
            direction,
            phase: ConversationPhase::initial(direction),
            profile,
            patient: PatientIdentity::default(),
            service: ServiceDetails::default(),
            contact: ContactInfo::default(),
            messages: Vec::new(),
            incidents: Vec::new(),
            observations: Vec::new(),
            requires_escalation: false,
            escalation_reason: None,
            legal_notice_acknowledged: false,
            survey_completed: false,
            confirmation_status: ConfirmationStatus::Pendiente,
            service_confirmed: false,
            date_change_requested: false,
            new_appointment_date: None,
            patient_away: false,
            patient_return_date: None,
            wrong_number: false,
            coverage_issue: false,
            special_needs: Vec::new(),
            record_row: None,
            turn_count: 0,
            max_turns: DEFAULT_MAX_TURNS,
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends a message to the history. History is append-only.
    pub fn append_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(MessageEntry::new(role, content));
        self.touch();
    }

    /// Appends a timestamped observation. Existing observations are never
    /// rewritten or removed.
    pub fn append_observation(&mut self, text: impl Into<String>) {
        self.observations.push(Observation {
            text: text.into(),
            created_at: Utc::now(),
        });
        self.touch();
    }

    /// Records an incident reported during the call.
    pub fn record_incident(&mut self, summary: impl Into<String>) {
        self.incidents.push(Incident {
            summary: summary.into(),
            created_at: Utc::now(),
        });
        self.touch();
    }

    /// Validated phase transition. Illegal targets leave the phase as-is
    /// and return the validation error.
    pub fn transition_to(&mut self, next: ConversationPhase) -> Result<(), ValidationError> {
        self.phase = self.phase.transition_to(next)?;
        self.touch();
        Ok(())
    }

    /// Merges extracted fields into the session.
    ///
    /// Field-level merge: absent and empty values are ignored, so a turn
    /// that did not discuss a field can never clear it.
    pub fn apply_extracted(&mut self, extracted: &ExtractedFields) {
        let identity = &extracted.identity;
        merge_string(&mut self.patient.full_name, &identity.patient_full_name);
        merge_string(&mut self.patient.document_type, &identity.document_type);
        merge_string(&mut self.patient.document_number, &identity.document_number);
        merge_string(&mut self.patient.eps, &identity.eps);
        merge_string(&mut self.contact.name, &identity.contact_name);
        merge_string(&mut self.contact.relationship, &identity.contact_relationship);
        if let Some(age) = identity.contact_age {
            self.contact.age = Some(age);
        }

        let service = &extracted.service;
        merge_string(&mut self.service.service_type, &service.service_type);
        merge_string(&mut self.service.treatment_type, &service.treatment_type);
        merge_string(&mut self.service.frequency, &service.frequency);
        merge_string(&mut self.service.appointment_date, &service.appointment_date);
        merge_string(&mut self.service.appointment_time, &service.appointment_time);
        merge_string(&mut self.service.pickup_address, &service.pickup_address);
        merge_string(&mut self.service.destination, &service.destination);
        merge_string(&mut self.service.transport_modality, &service.transport_modality);
        if let Some(count) = service.companion_count {
            self.service.companion_count = Some(count);
        }

        let operational = &extracted.operational;
        if let Some(confirmed) = operational.service_confirmed {
            self.service_confirmed = confirmed;
        }
        if let Some(status) = operational.confirmation_status {
            self.confirmation_status = status;
        }
        if let Some(changed) = operational.date_change_requested {
            self.date_change_requested = changed;
        }
        merge_string(&mut self.new_appointment_date, &operational.new_appointment_date);
        if let Some(away) = operational.patient_away {
            self.patient_away = away;
        }
        merge_string(&mut self.patient_return_date, &operational.patient_return_date);
        if let Some(wrong) = operational.wrong_number {
            self.wrong_number = wrong;
        }
        if let Some(adult) = operational.adult_confirmed {
            self.contact.adult_confirmed = adult;
        }
        for need in &operational.special_needs {
            let need = need.trim();
            if !need.is_empty() && !self.special_needs.iter().any(|n| n == need) {
                self.special_needs.push(need.to_string());
            }
        }
        if let Some(summary) = non_empty(&operational.incident_summary) {
            let summary = summary.to_string();
            debug!(session_id = %self.session_id, "recording incident from extraction");
            self.record_incident(summary);
        }

        self.touch();
    }

    /// Increments the turn counter, enforcing the max-turns limit.
    pub fn increment_turn(&mut self) -> Result<(), ValidationError> {
        if self.turn_count >= self.max_turns {
            return Err(ValidationError::out_of_range(
                "turn_count",
                0,
                self.max_turns as i64,
                (self.turn_count + 1) as i64,
            ));
        }
        self.turn_count += 1;
        self.touch();
        Ok(())
    }

    /// Returns the most recent user message, if any.
    pub fn latest_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    /// Returns true if the conversation has ended.
    pub fn is_ended(&self) -> bool {
        self.phase == ConversationPhase::End
    }

    /// Returns true if the session can accept another turn.
    pub fn can_accept_turn(&self) -> bool {
        !self.is_ended() && self.turn_count < self.max_turns
    }

    /// Marks the escalation flag. The flag is sticky: once raised by the
    /// guard or a turn, later turns cannot lower it.
    pub fn raise_escalation(&mut self, reason: impl Into<String>) {
        self.requires_escalation = true;
        let reason = reason.into();
        if !reason.is_empty() {
            self.escalation_reason = Some(reason);
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Replaces the target only when the update carries a non-empty value.
fn merge_string(target: &mut Option<String>, update: &Option<String>) {
    if let Some(value) = non_empty(update) {
        *target = Some(value.to_string());
    }
}
