//! Turn context assembly.
//!
//! Given the session and the latest user message, selects the relevant
//! policies and precedent cases, formats the already-known data (including
//! Spanish date localization for preloaded service records), and collects
//! the guard's alert flags. The result is a small bounded block of text
//! material for the prompt builder.
//!
//! Retrieval is best-effort: when nothing matches, the context simply
//! carries empty sets and the turn proceeds on base instructions alone.

use chrono::{Datelike, NaiveDate};
use std::sync::Arc;

use crate::domain::reference::ReferenceLibrary;

use super::guard::{GuardAlert, PolicyGuard};
use super::session::ConversationSession;

const DAY_NAMES_ES: [&str; 7] = [
    "LUNES", "MARTES", "MIÉRCOLES", "JUEVES", "VIERNES", "SÁBADO", "DOMINGO",
];
const MONTH_NAMES_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Bounded textual context for one turn.
#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    /// Guidance blocks from selected policies (≤2).
    pub policies: Vec<String>,
    /// Narrative blocks from selected cases (≤1).
    pub cases: Vec<String>,
    /// Labelled facts already known, so the agent does not re-ask.
    pub known_data: Vec<(String, String)>,
    /// Alert lines from the guard's pre-checks.
    pub alerts: Vec<String>,
}

/// Builds the per-turn context from session state and reference data.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    library: Arc<ReferenceLibrary>,
    guard: PolicyGuard,
}

impl ContextAssembler {
    pub fn new(library: Arc<ReferenceLibrary>, guard: PolicyGuard) -> Self {
        Self { library, guard }
    }

    /// Assembles the context for the current turn.
    ///
    /// `today` is the business-local date, injected for determinism.
    pub fn assemble(
        &self,
        session: &ConversationSession,
        message: &str,
        today: NaiveDate,
    ) -> AssembledContext {
        let policies = self
            .library
            .select_policies(message, session.phase, session.direction)
            .into_iter()
            .map(|p| format!("[{}] {}: {}", p.id, p.name, p.guidance))
            .collect();

        let cases = self
            .library
            .select_cases(message)
            .into_iter()
            .map(|c| format!("{}: {}", c.title, c.narrative))
            .collect();

        let known_data = self.format_known_data(session, today);

        let alerts = self
            .guard
            .pre_check(session, message)
            .into_iter()
            .map(|GuardAlert { message, .. }| message)
            .collect();

        AssembledContext {
            policies,
            cases,
            known_data,
            alerts,
        }
    }

    fn format_known_data(
        &self,
        session: &ConversationSession,
        today: NaiveDate,
    ) -> Vec<(String, String)> {
        let mut data = Vec::new();
        let push = |data: &mut Vec<(String, String)>, label: &str, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                data.push((label.to_string(), v.to_string()));
            }
        };

        push(&mut data, "Paciente", &session.patient.full_name);
        push(&mut data, "Tipo de documento", &session.patient.document_type);
        push(&mut data, "Número de documento", &session.patient.document_number);
        push(&mut data, "EPS", &session.patient.eps);
        push(&mut data, "Tipo de servicio", &session.service.service_type);
        push(&mut data, "Tratamiento", &session.service.treatment_type);
        push(&mut data, "Frecuencia", &session.service.frequency);

        if let Some(raw) = session.service.appointment_date.as_deref() {
            data.push((
                "Fecha de cita".to_string(),
                format_appointment_date(raw, today),
            ));
        }

        push(&mut data, "Hora de cita", &session.service.appointment_time);
        push(&mut data, "Dirección de recogida", &session.service.pickup_address);
        push(&mut data, "Destino", &session.service.destination);
        push(&mut data, "Modalidad", &session.service.transport_modality);
        push(&mut data, "Contacto", &session.contact.name);
        push(&mut data, "Relación con el paciente", &session.contact.relationship);
        if let Some(age) = session.contact.age {
            data.push(("Edad del contacto".to_string(), age.to_string()));
        }

        data
    }
}

/// Formats an appointment date for natural speech: weekday and month in
/// Spanish, with a relative prefix for today/tomorrow, e.g.
/// "mañana MARTES 20 de enero". Comma-separated recurring dates pick the
/// next upcoming one and mention how many more follow. Unparseable input
/// is returned verbatim.
pub fn format_appointment_date(raw: &str, today: NaiveDate) -> String {
    let parsed: Vec<NaiveDate> = raw
        .split(',')
        .map(str::trim)
        .filter_map(parse_flexible_date)
        .collect();

    if parsed.is_empty() {
        return raw.to_string();
    }

    let selected = parsed
        .iter()
        .filter(|d| **d >= today)
        .min()
        .or_else(|| parsed.first())
        .copied()
        .unwrap_or(today);

    let day_name = DAY_NAMES_ES[selected.weekday().num_days_from_monday() as usize];
    let month_name = MONTH_NAMES_ES[selected.month0() as usize];
    let date_text = format!("{} {:02} de {}", day_name, selected.day(), month_name);

    let mut result = match (selected - today).num_days() {
        0 => format!("hoy {}", date_text),
        1 => format!("mañana {}", date_text),
        2 => format!("pasado mañana {}", date_text),
        _ => date_text,
    };

    if parsed.len() > 1 {
        let extra = parsed.len() - 1;
        let plural = if extra > 1 { "s" } else { "" };
        result.push_str(&format!(" (y {} fecha{} más)", extra, plural));
    }

    result
}

/// Accepts ISO (`YYYY-MM-DD`) and Colombian (`DD/MM/YYYY`) date formats.
fn parse_flexible_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
        .ok()
}
