//! Deterministic prompt composition.
//!
//! Builds the full instruction set for one model call. Composition is a
//! pure function of the phase, the assembled context, and the session — no
//! shared template state. Ordering matters: later blocks are more specific
//! and take precedence when the model must resolve conflicts:
//!
//! persona → phase instructions → known data → policies/cases → alerts →
//! extraction rules → output schema.
//!
//! Mandatory compliance scripts (recording disclosure, identity
//! verification before sensitive data, final summary before closing) are
//! emitted by `phase_instructions` whenever the phase requires them; they
//! are a structural guarantee, not model discretion.

use crate::domain::foundation::StateMachine;

use super::context::AssembledContext;
use super::phase::ConversationPhase;
use super::session::{AgentProfile, ConversationSession};

/// Builds the system prompt for one turn.
pub fn build_prompt(
    phase: ConversationPhase,
    context: &AssembledContext,
    session: &ConversationSession,
) -> String {
    let profile = &session.profile;
    let mut prompt = String::with_capacity(2048);

    // 1. Persona
    prompt.push_str(&persona_block(profile));
    prompt.push('\n');

    // 2. Phase instructions, mandatory scripts included
    prompt.push_str(&phase_instructions(phase, profile, session));
    prompt.push('\n');

    // 3. Known data, so confirmed facts are never re-asked
    if !context.known_data.is_empty() {
        prompt.push_str("DATOS CONOCIDOS (no vuelvas a preguntarlos):\n");
        for (label, value) in &context.known_data {
            prompt.push_str(&format!("- {}: {}\n", label, value));
        }
        prompt.push('\n');
    }

    // 4. Retrieved policies and cases
    if !context.policies.is_empty() {
        prompt.push_str("POLÍTICAS APLICABLES AL CONTEXTO ACTUAL:\n");
        for policy in &context.policies {
            prompt.push_str(&format!("- {}\n", policy));
        }
        prompt.push('\n');
    }
    if !context.cases.is_empty() {
        prompt.push_str("CASOS SIMILARES:\n");
        for case in &context.cases {
            prompt.push_str(&format!("- {}\n", case));
        }
        prompt.push('\n');
    }

    // 5. Alerts
    if !context.alerts.is_empty() {
        prompt.push_str("ALERTAS CRÍTICAS:\n");
        for alert in &context.alerts {
            prompt.push_str(&format!("- {}\n", alert));
        }
        prompt.push('\n');
    }

    // 6. Extraction rules
    prompt.push_str(EXTRACTION_RULES);
    prompt.push('\n');

    // 7. Output schema, restricted to legal next phases
    prompt.push_str(&output_schema_block(phase));

    prompt
}

fn persona_block(profile: &AgentProfile) -> String {
    format!(
        "Eres {agent}, agente de coordinación de {company}, autorizada por la EPS {eps} \
         para gestionar transporte médico.\n\
         REGLAS CRÍTICAS:\n\
         - NO repitas lo que ya dijiste en turnos anteriores.\n\
         - NO preguntes datos que ya aparecen en DATOS CONOCIDOS.\n\
         - Máximo dos acciones por turno.\n\
         - Extrae datos de TODO el historial, no solo del último mensaje.\n\
         - RESPONDE SOLO con un objeto JSON válido según el esquema indicado.\n",
        agent = profile.agent_name,
        company = profile.company_name,
        eps = profile.eps_name,
    )
}

/// Phase-specific instructions. Mandatory scripts are always present for
/// the phases that require them.
pub fn phase_instructions(
    phase: ConversationPhase,
    profile: &AgentProfile,
    session: &ConversationSession,
) -> String {
    use ConversationPhase::*;
    match phase {
        Greeting => format!(
            "FASE SALUDO: Saluda según la hora, preséntate como {} de {} y pregunta en qué \
             puedes ayudar. No trates datos del servicio todavía.",
            profile.agent_name, profile.company_name
        ),
        Identification => "FASE IDENTIFICACIÓN: OBLIGATORIO verificar la identidad antes de \
             tratar cualquier dato sensible: nombre completo del paciente, tipo y número de \
             documento, y EPS. Si quien llama no es el paciente, pregunta su nombre y su \
             relación con el paciente."
            .to_string(),
        LegalNotice => "FASE AVISO LEGAL: OBLIGATORIO informar que la llamada está siendo \
             grabada para garantizar la calidad del servicio, y confirmar que el usuario lo \
             entiende antes de continuar."
            .to_string(),
        ServiceCoordination => "FASE COORDINACIÓN: Coordina el servicio de transporte: tipo de \
             servicio, fecha y hora de la cita, dirección de recogida y destino. Confirma cada \
             dato nuevo con el usuario."
            .to_string(),
        IncidentManagement => "FASE INCIDENCIAS: Escucha la queja, regístrala con detalle en \
             incident_summary y ofrece disculpas. No prometas conductores específicos ni \
             compensaciones."
            .to_string(),
        Escalation => format!(
            "FASE ESCALAMIENTO: Explica que la solicitud debe gestionarla directamente la EPS \
             {}. Entrega el canal de contacto de la EPS y deja registrada la novedad.",
            profile.eps_name
        ),
        Closing => "FASE CIERRE: OBLIGATORIO resumir lo acordado (servicio, fecha, hora, \
             dirección) antes de despedirte, y preguntar si hay algo más en lo que puedas \
             ayudar."
            .to_string(),
        Survey => "FASE ENCUESTA: Aplica la encuesta corta de satisfacción: califica la \
             atención de 1 a 5 y pregunta si tiene comentarios."
            .to_string(),
        End => "CONVERSACIÓN FINALIZADA: No hay más interacción.".to_string(),

        OutboundGreeting => {
            let patient = session
                .patient
                .full_name
                .as_deref()
                .unwrap_or("el paciente");
            format!(
                "FASE SALUDO SALIENTE: Saluda según la hora, preséntate como {} de {} y \
                 verifica con quién hablas: pregunta si te comunicas con {} o con un familiar. \
                 NO menciones detalles del servicio (fecha, hora, dirección) hasta confirmar \
                 la identidad del interlocutor.",
                profile.agent_name, profile.company_name, patient
            )
        }
        OutboundLegalNotice => "FASE AVISO LEGAL SALIENTE: OBLIGATORIO informar que la llamada \
             está siendo grabada para garantizar la calidad del servicio antes de tratar el \
             motivo de la llamada."
            .to_string(),
        OutboundServiceConfirmation => "FASE CONFIRMACIÓN: Confirma el servicio programado con \
             los datos conocidos (tipo de servicio, fecha, hora, dirección de recogida). \
             Pregunta explícitamente si confirma el servicio. Si confirma, marca \
             service_confirmed=true y confirmation_status=\"Confirmado\". Si pide cambios o \
             reporta novedades, pasa a casos especiales."
            .to_string(),
        OutboundSpecialCases => "FASE CASOS ESPECIALES: Gestiona la novedad: cambio de fecha \
             (registra la nueva fecha propuesta y marca Reprogramar), paciente fuera de la \
             ciudad, número equivocado, necesidades especiales o quejas. Registra todo en los \
             campos correspondientes."
            .to_string(),
        OutboundClosing => "FASE CIERRE SALIENTE: OBLIGATORIO resumir el estado final del \
             servicio (confirmado, reprogramado o con novedad) antes de despedirte según la \
             hora del día."
            .to_string(),
    }
}

const EXTRACTION_RULES: &str = "REGLAS DE EXTRACCIÓN:\n\
     - Revisa TODO el historial: si el usuario dio un dato en cualquier mensaje anterior, \
       inclúyelo en \"extracted\".\n\
     - \"no, con el hijo\" significa que quien habla es el hijo: extrae la relación, no la \
       vuelvas a preguntar.\n\
     - Usa null para los campos que este turno no trató; nunca inventes valores.\n";

fn output_schema_block(phase: ConversationPhase) -> String {
    let mut phases: Vec<&'static str> = Vec::new();
    if phase != ConversationPhase::End {
        phases.push(phase.wire_name());
    }
    for next in phase.valid_transitions() {
        if !phases.contains(&next.wire_name()) {
            phases.push(next.wire_name());
        }
    }
    let listed = phases
        .iter()
        .map(|p| format!("\"{}\"", p))
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        "RESPONDE CON JSON VÁLIDO:\n\
         {{\n\
           \"agent_response\": \"tu respuesta conversacional, sin JSON anidado\",\n\
           \"next_phase\": ({}),\n\
           \"requires_escalation\": false,\n\
           \"escalation_reason\": null,\n\
           \"extracted\": {{\n\
             \"identity\": {{\"patient_full_name\": null, \"document_type\": null, \
             \"document_number\": null, \"eps\": null, \"contact_name\": null, \
             \"contact_relationship\": null, \"contact_age\": null}},\n\
             \"service\": {{\"service_type\": null, \"treatment_type\": null, \
             \"frequency\": null, \"appointment_date\": null, \"appointment_time\": null, \
             \"pickup_address\": null, \"destination\": null, \"transport_modality\": null, \
             \"companion_count\": null}},\n\
             \"operational\": {{\"service_confirmed\": null, \"confirmation_status\": null, \
             \"date_change_requested\": null, \"new_appointment_date\": null, \
             \"patient_away\": null, \"patient_return_date\": null, \"wrong_number\": null, \
             \"adult_confirmed\": null, \"special_needs\": [], \"incident_summary\": null}}\n\
           }}\n\
         }}\n",
        listed
    )
}
