//! Escalation and policy guard.
//!
//! Deterministic rule checks that run independently of the model: before
//! the model call they produce alerts injected into the prompt context, and
//! after the call they can override the model's proposed output. A guard
//! violation is never dropped silently — it either corrects the output or
//! forces the escalation track.
//!
//! The guard outranks the model: it can raise `requires_escalation`, and a
//! model proposal can never lower an escalation the guard raised.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::foundation::StateMachine;

use super::phase::ConversationPhase;
use super::session::{ConfirmationStatus, ConversationSession};
use super::turn::TurnOutput;

/// Fallback scripts spoken when the guard rewrites a response.
const ADULT_REQUEST_SCRIPT: &str = "Por tratarse de información del servicio de salud, \
     necesito hablar con un adulto responsable. ¿Podría comunicarme con él o ella, por favor?";
const IDENTITY_VERIFICATION_SCRIPT: &str = "Para proteger los datos del paciente, ¿me indica \
     por favor su nombre completo y su relación con el paciente?";
const COVERAGE_SCRIPT: &str = "La dirección indicada está fuera de nuestra zona de cobertura, \
     por lo que no puedo confirmar el servicio. Registraré la novedad para que su EPS \
     coordine una alternativa.";
const COMPANION_SCRIPT: &str = "El servicio contempla máximo un acompañante autorizado. Para \
     acompañantes adicionales debe gestionarse una autorización con su EPS; dejaré la \
     solicitud registrada.";

/// Relationships authorized to coordinate on behalf of the patient.
const AUTHORIZED_RELATIONSHIPS: [&str; 14] = [
    "madre", "padre", "mamá", "papá", "hijo", "hija", "esposo", "esposa", "hermano", "hermana",
    "abuelo", "abuela", "cuidador", "enfermero",
];

/// Relationships that require an age check before disclosing anything.
const AGE_CHECK_RELATIONSHIPS: [&str; 4] = ["hijo", "hija", "nieto", "nieta"];

/// Keywords that indicate a request beyond this system's authority.
const ESCALATION_KEYWORDS: [&str; 8] = [
    "servicio expreso",
    "servicio express",
    "urgente ya",
    "inmediato",
    "fuera de la ciudad",
    "zona rural",
    "no autorizado",
    "sin autorización",
];

/// Guard configuration: coverage zone and companion policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// The single EPS this operation is authorized to serve.
    pub authorized_eps: String,
    /// Address fragments that mark a pickup as rural / out of zone.
    pub rural_keywords: Vec<String>,
    /// Cities outside the operational area.
    pub excluded_cities: Vec<String>,
    /// Maximum companions that can ride without EPS authorization.
    pub max_companions: u8,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            authorized_eps: "Cosalud".to_string(),
            rural_keywords: vec![
                "vereda".to_string(),
                "rural".to_string(),
                "corregimiento".to_string(),
                "campo".to_string(),
                " km ".to_string(),
            ],
            excluded_cities: vec![
                "bogotá".to_string(),
                "cali".to_string(),
                "cartagena".to_string(),
                "barranquilla".to_string(),
            ],
            max_companions: 1,
        }
    }
}

/// An alert injected into the prompt context before the model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardAlert {
    pub rule: &'static str,
    pub message: String,
}

/// Result of the post-model guard evaluation.
#[derive(Debug, Clone)]
pub struct GuardVerdict {
    /// True if the model's proposal was rewritten.
    pub overridden: bool,
    /// The output to commit (corrected if `overridden`).
    pub output: TurnOutput,
    /// Human-readable reasons for every correction applied.
    pub reasons: Vec<String>,
}

/// Rule-based checks that run around every model invocation.
#[derive(Debug, Clone, Default)]
pub struct PolicyGuard {
    config: GuardConfig,
}

impl PolicyGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Pre-model checks: produce alerts for the prompt context.
    pub fn pre_check(&self, session: &ConversationSession, message: &str) -> Vec<GuardAlert> {
        let mut alerts = Vec::new();

        // Confirmation phases cannot proceed without a date
        if matches!(
            session.phase,
            ConversationPhase::OutboundServiceConfirmation | ConversationPhase::ServiceCoordination
        ) && session.service.appointment_date.is_none()
        {
            alerts.push(GuardAlert {
                rule: "missing_date",
                message: "FALTA FECHA - No puedes confirmar un servicio sin fecha".to_string(),
            });
        }

        // Family contacts that may be minors must be age-checked first
        if let Some(relationship) = session.contact.relationship.as_deref() {
            let rel = relationship.to_lowercase();
            if AGE_CHECK_RELATIONSHIPS.contains(&rel.as_str()) && session.contact.age.is_none() {
                alerts.push(GuardAlert {
                    rule: "age_unverified",
                    message: "VALIDAR EDAD - El contacto es familiar directo; pregunta su edad \
                              antes de dar información"
                        .to_string(),
                });
            }
        }

        if session.contact.is_minor() && !session.contact.adult_confirmed {
            alerts.push(GuardAlert {
                rule: "minor_contact",
                message: "MENOR DE EDAD - No entregues datos del servicio; solicita un adulto \
                          responsable"
                    .to_string(),
            });
        }

        if let Some(reason) = self.address_out_of_zone(session) {
            alerts.push(GuardAlert {
                rule: "coverage",
                message: format!("ZONA SIN COBERTURA - {}", reason),
            });
        }

        if let Some(eps) = session.patient.eps.as_deref() {
            if !eps.eq_ignore_ascii_case(&self.config.authorized_eps) {
                alerts.push(GuardAlert {
                    rule: "eps_mismatch",
                    message: format!(
                        "EPS NO AUTORIZADA - {} no es {}; redirige a su EPS",
                        eps, self.config.authorized_eps
                    ),
                });
            }
        }

        if let Some(keyword) = self.escalation_keyword(message) {
            alerts.push(GuardAlert {
                rule: "escalation_keyword",
                message: format!("FUERA DE ALCANCE - El usuario mencionó \"{}\"", keyword),
            });
        }

        alerts
    }

    /// Post-model checks: correct the proposal wherever it breaches a hard
    /// rule. Session-level effects (coverage flag, sticky escalation) are
    /// applied here so the committed state can never contradict the rules.
    pub fn evaluate(
        &self,
        session: &mut ConversationSession,
        user_message: &str,
        proposed: TurnOutput,
    ) -> GuardVerdict {
        let mut output = proposed;
        let mut reasons: Vec<String> = Vec::new();

        // Rule: underage contact without a confirmed adult blocks any
        // sensitive phase and any service detail in the response.
        if session.contact.is_minor() && !session.contact.adult_confirmed {
            let proposed_phase = output.next_phase;
            if proposed_phase.discloses_sensitive_data() || proposed_phase != session.phase {
                output.next_phase = session.phase;
            }
            output.agent_response = ADULT_REQUEST_SCRIPT.to_string();
            output.requires_escalation = true;
            reasons.push("Contacto menor de edad sin adulto responsable".to_string());
        } else if let Some(relationship) = session.contact.relationship.as_deref() {
            // Rule: unauthorized relationships cannot receive service
            // details until the patient or an authorized party is confirmed.
            let rel = relationship.to_lowercase();
            let authorized = AUTHORIZED_RELATIONSHIPS.contains(&rel.as_str());
            if !authorized && output.next_phase.discloses_sensitive_data() {
                output.next_phase = session.phase;
                output.agent_response = IDENTITY_VERIFICATION_SCRIPT.to_string();
                reasons.push(format!("Relación no autorizada: {}", relationship));
            }
        }

        // Rule: out-of-zone addresses suppress confirmation entirely.
        if let Some(reason) = self.address_out_of_zone(session) {
            session.coverage_issue = true;
            session.confirmation_status = ConfirmationStatus::ZonaSinCobertura;
            session.service_confirmed = false;
            output.requires_escalation = true;
            output.extracted.operational.service_confirmed = None;
            output.extracted.operational.confirmation_status = None;
            if response_confirms_service(&output) {
                output.agent_response = COVERAGE_SCRIPT.to_string();
            }
            reasons.push(reason);
        }

        // Rule: companion count above the policy maximum goes to the EPS.
        if let Some(count) = session.service.companion_count {
            if count > self.config.max_companions {
                session.service_confirmed = false;
                output.requires_escalation = true;
                output.extracted.operational.service_confirmed = None;
                output.agent_response = COMPANION_SCRIPT.to_string();
                reasons.push(format!(
                    "Acompañantes solicitados ({}) superan el máximo ({})",
                    count, self.config.max_companions
                ));
            }
        }

        // Rule: a different EPS is a blocking condition.
        if let Some(eps) = session.patient.eps.as_deref() {
            if !eps.eq_ignore_ascii_case(&self.config.authorized_eps) {
                output.requires_escalation = true;
                output.next_phase = escalation_phase_or_hold(session.phase, output.next_phase);
                reasons.push(format!("EPS no autorizada: {}", eps));
            }
        }

        // Rule: explicit out-of-scope requests escalate.
        if let Some(keyword) = self.escalation_keyword(user_message) {
            output.requires_escalation = true;
            reasons.push(format!("Solicitud fuera de alcance: \"{}\"", keyword));
        }

        // The model can never lower an escalation already raised.
        if session.requires_escalation {
            output.requires_escalation = true;
        }

        if output.requires_escalation {
            let reason = reasons.join("; ");
            if !reason.is_empty() {
                session.raise_escalation(reason);
            } else {
                session.requires_escalation = true;
            }
        }

        let overridden = !reasons.is_empty();
        if overridden {
            warn!(
                session_id = %session.session_id,
                phase = %session.phase,
                corrections = reasons.len(),
                "policy guard overrode model proposal"
            );
        }

        GuardVerdict {
            overridden,
            output,
            reasons,
        }
    }

    /// Returns the reason if pickup or destination resolves out of zone.
    fn address_out_of_zone(&self, session: &ConversationSession) -> Option<String> {
        for address in [
            session.service.pickup_address.as_deref(),
            session.service.destination.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            let lower = address.to_lowercase();
            for keyword in &self.config.rural_keywords {
                if lower.contains(keyword.as_str()) {
                    return Some(format!("Dirección rural fuera de cobertura: {}", address));
                }
            }
            for city in &self.config.excluded_cities {
                if lower.contains(city.as_str()) {
                    return Some(format!("Ciudad fuera del área operativa: {}", city));
                }
            }
        }
        None
    }

    fn escalation_keyword(&self, message: &str) -> Option<&'static str> {
        let lower = message.to_lowercase();
        ESCALATION_KEYWORDS
            .iter()
            .find(|k| lower.contains(*k))
            .copied()
    }
}

/// Redirects toward the escalation phase when the graph allows it,
/// otherwise holds the current phase.
fn escalation_phase_or_hold(
    current: ConversationPhase,
    proposed: ConversationPhase,
) -> ConversationPhase {
    if current.can_transition_to(&ConversationPhase::Escalation) {
        ConversationPhase::Escalation
    } else if current.can_transition_to(&proposed) && !proposed.discloses_sensitive_data() {
        proposed
    } else {
        current
    }
}

/// Heuristic: does the response read like a service confirmation?
fn response_confirms_service(output: &TurnOutput) -> bool {
    let lower = output.agent_response.to_lowercase();
    lower.contains("confirmado")
        || lower.contains("queda confirmad")
        || output.extracted.operational.service_confirmed == Some(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::session::AgentProfile;

    fn guard() -> PolicyGuard {
        PolicyGuard::default()
    }

    fn outbound_session() -> ConversationSession {
        let mut session = ConversationSession::new_inbound(AgentProfile::default());
        session.direction = crate::domain::conversation::CallDirection::Outbound;
        session.phase = ConversationPhase::OutboundGreeting;
        session
    }

    fn proposal(phase: ConversationPhase, response: &str) -> TurnOutput {
        TurnOutput {
            agent_response: response.to_string(),
            next_phase: phase,
            requires_escalation: false,
            escalation_reason: None,
            extracted: Default::default(),
        }
    }

    mod pre_checks {
        use super::*;

        #[test]
        fn missing_date_alert_in_confirmation_phase() {
            let mut session = outbound_session();
            session.phase = ConversationPhase::OutboundServiceConfirmation;
            session.service.appointment_date = None;
            let alerts = guard().pre_check(&session, "sí");
            assert!(alerts.iter().any(|a| a.rule == "missing_date"));
        }

        #[test]
        fn no_missing_date_alert_when_date_present() {
            let mut session = outbound_session();
            session.phase = ConversationPhase::OutboundServiceConfirmation;
            session.service.appointment_date = Some("2024-01-20".to_string());
            let alerts = guard().pre_check(&session, "sí");
            assert!(!alerts.iter().any(|a| a.rule == "missing_date"));
        }

        #[test]
        fn family_contact_without_age_triggers_age_alert() {
            let mut session = outbound_session();
            session.contact.relationship = Some("hija".to_string());
            let alerts = guard().pre_check(&session, "hola");
            assert!(alerts.iter().any(|a| a.rule == "age_unverified"));
        }

        #[test]
        fn minor_contact_triggers_minor_alert() {
            let mut session = outbound_session();
            session.contact.relationship = Some("hijo".to_string());
            session.contact.age = Some(15);
            let alerts = guard().pre_check(&session, "hola");
            assert!(alerts.iter().any(|a| a.rule == "minor_contact"));
        }

        #[test]
        fn confirmed_adult_suppresses_minor_alert() {
            let mut session = outbound_session();
            session.contact.age = Some(15);
            session.contact.adult_confirmed = true;
            let alerts = guard().pre_check(&session, "hola");
            assert!(!alerts.iter().any(|a| a.rule == "minor_contact"));
        }

        #[test]
        fn rural_address_triggers_coverage_alert() {
            let mut session = outbound_session();
            session.service.pickup_address = Some("Vereda El Carmen".to_string());
            let alerts = guard().pre_check(&session, "hola");
            assert!(alerts.iter().any(|a| a.rule == "coverage"));
        }

        #[test]
        fn escalation_keyword_triggers_alert() {
            let session = outbound_session();
            let alerts = guard().pre_check(&session, "necesito un servicio expreso");
            assert!(alerts.iter().any(|a| a.rule == "escalation_keyword"));
        }
    }

    mod minor_rule {
        use super::*;

        #[test]
        fn minor_contact_holds_phase_and_escalates() {
            let mut session = outbound_session();
            session.contact.age = Some(15);
            session.service.appointment_date = Some("2024-01-20".to_string());

            let proposed = proposal(
                ConversationPhase::OutboundLegalNotice,
                "Su cita de diálisis es el 20 de enero a las 7:00",
            );
            let verdict = guard().evaluate(&mut session, "tengo 15", proposed);

            assert!(verdict.overridden);
            assert_eq!(verdict.output.next_phase, ConversationPhase::OutboundGreeting);
            assert!(verdict.output.requires_escalation);
            assert!(!verdict.output.agent_response.contains("diálisis"));
            assert!(!verdict.output.agent_response.contains("enero"));
            assert!(verdict.output.agent_response.contains("adulto"));
        }

        #[test]
        fn adult_contact_passes_through() {
            let mut session = outbound_session();
            session.contact.age = Some(45);
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "Continuemos");
            let verdict = guard().evaluate(&mut session, "tengo 45", proposed);
            assert!(!verdict.overridden);
            assert_eq!(verdict.output.next_phase, ConversationPhase::OutboundLegalNotice);
        }
    }

    mod relationship_rule {
        use super::*;

        #[test]
        fn unauthorized_relationship_blocks_sensitive_phase() {
            let mut session = outbound_session();
            session.phase = ConversationPhase::OutboundLegalNotice;
            session.contact.relationship = Some("vecino".to_string());

            let proposed =
                proposal(ConversationPhase::OutboundServiceConfirmation, "Su servicio es mañana");
            let verdict = guard().evaluate(&mut session, "soy el vecino", proposed);

            assert!(verdict.overridden);
            assert_eq!(verdict.output.next_phase, ConversationPhase::OutboundLegalNotice);
            assert!(verdict.output.agent_response.contains("relación"));
        }

        #[test]
        fn authorized_relationship_is_not_blocked() {
            let mut session = outbound_session();
            session.phase = ConversationPhase::OutboundLegalNotice;
            session.contact.relationship = Some("esposa".to_string());
            session.contact.age = Some(50);

            let proposed =
                proposal(ConversationPhase::OutboundServiceConfirmation, "Su servicio es mañana");
            let verdict = guard().evaluate(&mut session, "soy la esposa", proposed);
            assert!(!verdict.overridden);
        }
    }

    mod coverage_rule {
        use super::*;

        #[test]
        fn out_of_zone_address_sets_status_regardless_of_proposal() {
            let mut session = outbound_session();
            session.phase = ConversationPhase::OutboundServiceConfirmation;
            session.service.pickup_address = Some("Vereda La Esperanza, km 12".to_string());

            let proposed = proposal(
                ConversationPhase::OutboundClosing,
                "Perfecto, su servicio queda confirmado",
            );
            let verdict = guard().evaluate(&mut session, "esa es la dirección", proposed);

            assert!(verdict.overridden);
            assert_eq!(
                session.confirmation_status,
                ConfirmationStatus::ZonaSinCobertura
            );
            assert!(!session.service_confirmed);
            assert!(session.coverage_issue);
            assert!(verdict.output.requires_escalation);
            assert!(!verdict.output.agent_response.contains("confirmado"));
        }

        #[test]
        fn excluded_city_is_out_of_zone() {
            let mut session = outbound_session();
            session.service.destination = Some("Clínica Central, Bogotá".to_string());
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "De acuerdo");
            let verdict = guard().evaluate(&mut session, "queda en Bogotá", proposed);
            assert!(verdict.overridden);
            assert_eq!(
                session.confirmation_status,
                ConfirmationStatus::ZonaSinCobertura
            );
        }

        #[test]
        fn urban_address_is_in_zone() {
            let mut session = outbound_session();
            session.service.pickup_address = Some("Calle 45 #12-30, Santa Marta".to_string());
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "De acuerdo");
            let verdict = guard().evaluate(&mut session, "correcto", proposed);
            assert!(!verdict.overridden);
            assert_eq!(session.confirmation_status, ConfirmationStatus::Pendiente);
        }
    }

    mod companion_rule {
        use super::*;

        #[test]
        fn excess_companions_redirect_to_eps() {
            let mut session = outbound_session();
            session.service.companion_count = Some(3);
            let proposed = proposal(ConversationPhase::OutboundClosing, "Confirmado con 3 acompañantes");
            let verdict = guard().evaluate(&mut session, "van tres acompañantes", proposed);
            assert!(verdict.overridden);
            assert!(verdict.output.requires_escalation);
            assert!(verdict.output.agent_response.contains("EPS"));
        }

        #[test]
        fn single_companion_is_allowed() {
            let mut session = outbound_session();
            session.service.companion_count = Some(1);
            let proposed = proposal(ConversationPhase::OutboundClosing, "Listo");
            let verdict = guard().evaluate(&mut session, "va un acompañante", proposed);
            assert!(!verdict.overridden);
        }
    }

    mod eps_rule {
        use super::*;

        #[test]
        fn other_eps_forces_escalation_track_inbound() {
            let mut session = ConversationSession::new_inbound(AgentProfile::default());
            session.phase = ConversationPhase::Identification;
            session.patient.eps = Some("Salud Total".to_string());

            let proposed = proposal(ConversationPhase::LegalNotice, "Continuemos");
            let verdict = guard().evaluate(&mut session, "mi eps es Salud Total", proposed);

            assert!(verdict.overridden);
            assert_eq!(verdict.output.next_phase, ConversationPhase::Escalation);
            assert!(verdict.output.requires_escalation);
        }

        #[test]
        fn authorized_eps_is_case_insensitive() {
            let mut session = outbound_session();
            session.patient.eps = Some("COSALUD".to_string());
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "Continuemos");
            let verdict = guard().evaluate(&mut session, "cosalud", proposed);
            assert!(!verdict.overridden);
        }
    }

    mod escalation_authority {
        use super::*;

        #[test]
        fn model_cannot_lower_raised_escalation() {
            let mut session = outbound_session();
            session.raise_escalation("zona sin cobertura");

            let mut proposed = proposal(ConversationPhase::OutboundClosing, "Todo en orden");
            proposed.requires_escalation = false;

            let verdict = guard().evaluate(&mut session, "gracias", proposed);
            assert!(verdict.output.requires_escalation);
        }

        #[test]
        fn express_request_escalates() {
            let mut session = outbound_session();
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "Veamos");
            let verdict =
                guard().evaluate(&mut session, "necesito un servicio expreso ya", proposed);
            assert!(verdict.output.requires_escalation);
            assert!(session.requires_escalation);
        }

        #[test]
        fn clean_turn_is_untouched() {
            let mut session = outbound_session();
            let proposed = proposal(ConversationPhase::OutboundLegalNotice, "Le comento que la llamada es grabada");
            let verdict = guard().evaluate(&mut session, "sí dígame", proposed.clone());
            assert!(!verdict.overridden);
            assert_eq!(verdict.output, proposed);
            assert!(verdict.reasons.is_empty());
        }
    }
}
