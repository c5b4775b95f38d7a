//! Policy and case-example reference library.
//!
//! Policies describe coordination rules the agent must respect; cases are
//! worked examples of tricky situations. Both are static, numbered entries
//! used for retrieval, never mutated at runtime.

use serde::{Deserialize, Serialize};

use crate::domain::conversation::{CallDirection, ConversationPhase};

/// At most this many policies are injected into a single prompt.
pub const MAX_POLICIES_PER_TURN: usize = 2;
/// At most this many case examples are injected into a single prompt.
pub const MAX_CASES_PER_TURN: usize = 1;

/// Category of a coordination policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyCategory {
    Conductor,
    Servicio,
    Geografia,
    Modalidad,
    Protocolo,
}

/// Severity of a policy when breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicySeverity {
    Info,
    Warning,
    Blocking,
}

/// A numbered coordination policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Stable identifier, e.g. `GEOGRAFIA_001`.
    pub id: String,
    pub name: String,
    pub category: PolicyCategory,
    pub severity: PolicySeverity,
    /// Phases where this policy applies; empty means all phases.
    pub applicable_phases: Vec<ConversationPhase>,
    /// Directions where this policy applies; empty means both.
    pub applicable_directions: Vec<CallDirection>,
    /// Keywords used for relevance scoring against the user message.
    pub keywords: Vec<String>,
    /// Guidance text injected into the prompt when the policy is selected.
    pub guidance: String,
}

impl PolicyRule {
    /// Returns true if the policy applies to the given phase and direction.
    pub fn is_applicable(&self, phase: ConversationPhase, direction: CallDirection) -> bool {
        let phase_ok =
            self.applicable_phases.is_empty() || self.applicable_phases.contains(&phase);
        let direction_ok = self.applicable_directions.is_empty()
            || self.applicable_directions.contains(&direction);
        phase_ok && direction_ok
    }

    fn score(&self, message: &str) -> usize {
        let lower = message.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lower.contains(k.to_lowercase().as_str()))
            .count()
    }
}

/// A precedent case: how a past tricky call was handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExample {
    pub id: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub narrative: String,
}

impl CaseExample {
    fn score(&self, message: &str) -> usize {
        let lower = message.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| lower.contains(k.to_lowercase().as_str()))
            .count()
    }
}

/// Loaded-once reference library with keyword retrieval.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    policies: Vec<PolicyRule>,
    cases: Vec<CaseExample>,
}

impl ReferenceLibrary {
    /// Creates a library from preloaded entries.
    pub fn new(policies: Vec<PolicyRule>, cases: Vec<CaseExample>) -> Self {
        Self { policies, cases }
    }

    /// Built-in policy set mirroring the operator's rulebook.
    pub fn builtin() -> Self {
        Self::new(builtin_policies(), builtin_cases())
    }

    pub fn policies(&self) -> &[PolicyRule] {
        &self.policies
    }

    pub fn cases(&self) -> &[CaseExample] {
        &self.cases
    }

    /// Selects the most relevant policies for the current turn, bounded to
    /// [`MAX_POLICIES_PER_TURN`]. Only policies with at least one keyword
    /// hit are returned.
    pub fn select_policies(
        &self,
        message: &str,
        phase: ConversationPhase,
        direction: CallDirection,
    ) -> Vec<&PolicyRule> {
        let mut scored: Vec<(usize, &PolicyRule)> = self
            .policies
            .iter()
            .filter(|p| p.is_applicable(phase, direction))
            .map(|p| (p.score(message), p))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored
            .into_iter()
            .take(MAX_POLICIES_PER_TURN)
            .map(|(_, p)| p)
            .collect()
    }

    /// Selects the single most relevant case example, if any keyword hits.
    pub fn select_cases(&self, message: &str) -> Vec<&CaseExample> {
        let mut scored: Vec<(usize, &CaseExample)> = self
            .cases
            .iter()
            .map(|c| (c.score(message), c))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.id.cmp(&b.1.id)));
        scored
            .into_iter()
            .take(MAX_CASES_PER_TURN)
            .map(|(_, c)| c)
            .collect()
    }
}

fn builtin_policies() -> Vec<PolicyRule> {
    use ConversationPhase::*;
    vec![
        PolicyRule {
            id: "CONDUCTOR_001".to_string(),
            name: "Límite de asignación de conductores".to_string(),
            category: PolicyCategory::Conductor,
            severity: PolicySeverity::Warning,
            applicable_phases: vec![],
            applicable_directions: vec![],
            keywords: vec!["conductor".to_string(), "chofer".to_string()],
            guidance: "No prometas un conductor específico. Registra la preferencia \
                       como sugerencia para el área operativa."
                .to_string(),
        },
        PolicyRule {
            id: "SERVICIO_001".to_string(),
            name: "Autorización única de EPS".to_string(),
            category: PolicyCategory::Servicio,
            severity: PolicySeverity::Blocking,
            applicable_phases: vec![Identification, ServiceCoordination],
            applicable_directions: vec![],
            keywords: vec!["eps".to_string(), "autorización".to_string(), "autorizacion".to_string()],
            guidance: "Solo se coordinan servicios autorizados por la EPS contratante. \
                       Cualquier otra EPS se redirige."
                .to_string(),
        },
        PolicyRule {
            id: "GEOGRAFIA_001".to_string(),
            name: "Cobertura geográfica urbana".to_string(),
            category: PolicyCategory::Geografia,
            severity: PolicySeverity::Blocking,
            applicable_phases: vec![ServiceCoordination, OutboundServiceConfirmation, OutboundSpecialCases],
            applicable_directions: vec![],
            keywords: vec![
                "vereda".to_string(),
                "rural".to_string(),
                "dirección".to_string(),
                "direccion".to_string(),
                "recogida".to_string(),
            ],
            guidance: "La cobertura es únicamente urbana. Direcciones rurales o fuera \
                       de la ciudad no se confirman; se remiten a la EPS."
                .to_string(),
        },
        PolicyRule {
            id: "MODALIDAD_001".to_string(),
            name: "Modalidad estándar de ruta".to_string(),
            category: PolicyCategory::Modalidad,
            severity: PolicySeverity::Warning,
            applicable_phases: vec![ServiceCoordination, OutboundServiceConfirmation],
            applicable_directions: vec![],
            keywords: vec!["expreso".to_string(), "exclusivo".to_string(), "express".to_string()],
            guidance: "La modalidad estándar es ruta compartida. Los servicios expresos \
                       requieren autorización de la EPS."
                .to_string(),
        },
        PolicyRule {
            id: "PROTOCOLO_001".to_string(),
            name: "Aviso de grabación".to_string(),
            category: PolicyCategory::Protocolo,
            severity: PolicySeverity::Blocking,
            applicable_phases: vec![Greeting, LegalNotice, OutboundGreeting, OutboundLegalNotice],
            applicable_directions: vec![],
            keywords: vec!["grabada".to_string(), "grabación".to_string(), "grabacion".to_string()],
            guidance: "Informa que la llamada está siendo grabada antes de tratar \
                       datos del servicio."
                .to_string(),
        },
    ]
}

fn builtin_cases() -> Vec<CaseExample> {
    vec![
        CaseExample {
            id: "CASO_001".to_string(),
            title: "Queja por puntualidad del conductor".to_string(),
            keywords: vec![
                "tarde".to_string(),
                "demora".to_string(),
                "puntualidad".to_string(),
                "conductor".to_string(),
            ],
            narrative: "El usuario reportó retrasos recurrentes. Se registró la \
                        incidencia con fecha y franja horaria, se ofreció disculpa \
                        y se escaló al área operativa sin prometer un conductor fijo."
                .to_string(),
        },
        CaseExample {
            id: "CASO_002".to_string(),
            title: "Cambio de fecha solicitado durante confirmación".to_string(),
            keywords: vec![
                "cambiar".to_string(),
                "otra fecha".to_string(),
                "reprogramar".to_string(),
            ],
            narrative: "El paciente pidió mover la cita. Se registró la nueva fecha \
                        propuesta, se marcó el servicio como Reprogramar y se \
                        explicó que la central confirmaría la disponibilidad."
                .to_string(),
        },
        CaseExample {
            id: "CASO_003".to_string(),
            title: "Dirección en zona rural".to_string(),
            keywords: vec!["vereda".to_string(), "rural".to_string(), "finca".to_string()],
            narrative: "La dirección de recogida quedaba en una vereda fuera de la \
                        cobertura urbana. No se confirmó el servicio; se marcó Zona \
                        sin cobertura y se indicó el canal de la EPS."
                .to_string(),
        },
    ]
}
