//! Conversation phases and the transition graph.
//!
//! Two parallel tracks exist: inbound calls (the patient calls us) walk
//! GREETING through SURVEY, outbound calls (we call to confirm a scheduled
//! service) walk the OUTBOUND_* phases. Both tracks terminate in END.
//!
//! The graph is the single authority on legal transitions. The model only
//! proposes a `next_phase`; anything not declared here is rejected and the
//! phase is held.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// Direction of the call, which selects the phase track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallDirection {
    /// Customer calls us (coordination, incidents, surveys).
    Inbound,
    /// We call the customer to confirm a scheduled service.
    Outbound,
}

impl CallDirection {
    pub fn is_inbound(&self) -> bool {
        matches!(self, Self::Inbound)
    }

    pub fn is_outbound(&self) -> bool {
        matches!(self, Self::Outbound)
    }
}

/// A stage in the conversation flow.
///
/// Inbound track:
/// `Greeting -> Identification -> LegalNotice -> ServiceCoordination ->
/// [IncidentManagement | Escalation] -> Closing -> Survey -> End`,
/// where `IncidentManagement` may loop back to `ServiceCoordination`.
///
/// Outbound track:
/// `OutboundGreeting -> OutboundLegalNotice -> OutboundServiceConfirmation ->
/// [OutboundSpecialCases] -> OutboundClosing -> End`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversationPhase {
    // Inbound track
    Greeting,
    Identification,
    LegalNotice,
    ServiceCoordination,
    IncidentManagement,
    Escalation,
    Closing,
    Survey,
    End,

    // Outbound track
    OutboundGreeting,
    OutboundLegalNotice,
    OutboundServiceConfirmation,
    OutboundSpecialCases,
    OutboundClosing,
}

impl ConversationPhase {
    /// The entry phase for a call direction.
    pub fn initial(direction: CallDirection) -> Self {
        match direction {
            CallDirection::Inbound => Self::Greeting,
            CallDirection::Outbound => Self::OutboundGreeting,
        }
    }

    /// Human-readable display name (Spanish, as shown to supervisors).
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Greeting => "Saludo",
            Self::Identification => "Identificación",
            Self::LegalNotice => "Aviso Legal",
            Self::ServiceCoordination => "Coordinación de Servicio",
            Self::IncidentManagement => "Gestión de Incidencias",
            Self::Escalation => "Escalamiento a EPS",
            Self::Closing => "Cierre",
            Self::Survey => "Encuesta",
            Self::End => "Finalizado",
            Self::OutboundGreeting => "Saludo e Identificación (Saliente)",
            Self::OutboundLegalNotice => "Aviso Legal (Saliente)",
            Self::OutboundServiceConfirmation => "Confirmación de Servicio",
            Self::OutboundSpecialCases => "Casos Especiales",
            Self::OutboundClosing => "Cierre (Saliente)",
        }
    }

    /// Wire name, matching the serialized representation.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Greeting => "GREETING",
            Self::Identification => "IDENTIFICATION",
            Self::LegalNotice => "LEGAL_NOTICE",
            Self::ServiceCoordination => "SERVICE_COORDINATION",
            Self::IncidentManagement => "INCIDENT_MANAGEMENT",
            Self::Escalation => "ESCALATION",
            Self::Closing => "CLOSING",
            Self::Survey => "SURVEY",
            Self::End => "END",
            Self::OutboundGreeting => "OUTBOUND_GREETING",
            Self::OutboundLegalNotice => "OUTBOUND_LEGAL_NOTICE",
            Self::OutboundServiceConfirmation => "OUTBOUND_SERVICE_CONFIRMATION",
            Self::OutboundSpecialCases => "OUTBOUND_SPECIAL_CASES",
            Self::OutboundClosing => "OUTBOUND_CLOSING",
        }
    }

    /// Typical position in the inbound flow, for reporting.
    pub fn sequence_order(&self) -> u8 {
        match self {
            Self::Greeting => 1,
            Self::Identification => 2,
            Self::LegalNotice => 3,
            Self::ServiceCoordination => 4,
            Self::IncidentManagement => 5,
            Self::Escalation => 6,
            Self::Closing => 7,
            Self::Survey => 8,
            Self::End => 9,
            _ => 0,
        }
    }

    /// Phases that can be skipped entirely in a normal flow.
    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            Self::IncidentManagement | Self::Escalation | Self::OutboundSpecialCases
        )
    }

    /// Returns true if this phase belongs to the outbound track.
    pub fn is_outbound(&self) -> bool {
        matches!(
            self,
            Self::OutboundGreeting
                | Self::OutboundLegalNotice
                | Self::OutboundServiceConfirmation
                | Self::OutboundSpecialCases
                | Self::OutboundClosing
        )
    }

    /// Returns true if the agent may disclose service details (dates,
    /// addresses, document data) in this phase. Used by the policy guard to
    /// block progression for unverified or underage contacts.
    pub fn discloses_sensitive_data(&self) -> bool {
        matches!(
            self,
            Self::ServiceCoordination
                | Self::IncidentManagement
                | Self::OutboundServiceConfirmation
                | Self::OutboundSpecialCases
        )
    }

    /// Returns true if this phase still expects user input.
    pub fn requires_user_input(&self) -> bool {
        !matches!(self, Self::End)
    }
}

impl StateMachine for ConversationPhase {
    fn can_transition_to(&self, target: &Self) -> bool {
        // END is fully terminal
        if matches!(self, Self::End) {
            return false;
        }

        // Repeating the current phase is always legal (re-ask, clarify)
        if self == target {
            return true;
        }

        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationPhase::*;
        match self {
            // Inbound flow
            Greeting => vec![Identification],
            Identification => vec![LegalNotice, Escalation],
            LegalNotice => vec![ServiceCoordination],
            ServiceCoordination => vec![IncidentManagement, Escalation, Closing],
            // IncidentManagement may loop back to coordination
            IncidentManagement => vec![ServiceCoordination, Escalation, Closing],
            Escalation => vec![Closing],
            Closing => vec![Survey],
            Survey => vec![End],
            End => vec![],

            // Outbound flow
            OutboundGreeting => vec![OutboundLegalNotice, End],
            // Special cases may be raised before confirmation (complaints,
            // date changes voiced early)
            OutboundLegalNotice => vec![OutboundServiceConfirmation, OutboundSpecialCases],
            OutboundServiceConfirmation => vec![OutboundSpecialCases, OutboundClosing],
            OutboundSpecialCases => vec![OutboundServiceConfirmation, OutboundClosing],
            // Outbound calls skip the survey
            OutboundClosing => vec![End],
        }
    }
}

impl std::fmt::Display for ConversationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}
