//! End-to-end conversation scenarios with a scripted model.
//!
//! Each test wires the coordinator with the mock provider, the in-memory
//! session store, and the in-memory record source, then drives whole turns
//! through the public API.

use std::sync::Arc;

use medroute::adapters::ai::MockModelProvider;
use medroute::adapters::records::InMemoryRecordSource;
use medroute::adapters::storage::InMemorySessionStore;
use medroute::application::{CallCoordinator, CoordinatorError};
use medroute::domain::conversation::{
    AgentProfile, CallDirection, ConfirmationStatus, ContextAssembler, ConversationPhase,
    ExecutorOptions, PatientIdentity, PolicyGuard, ServiceDetails, ServiceRecordSeed,
    TurnExecutor, FALLBACK_RESPONSE,
};
use medroute::domain::foundation::SessionId;
use medroute::domain::reference::ReferenceLibrary;
use medroute::ports::{ServiceRecordSource, SessionStore};

struct Harness {
    coordinator: CallCoordinator,
    store: Arc<InMemorySessionStore>,
    records: Arc<InMemoryRecordSource>,
    provider: MockModelProvider,
}

fn dialysis_record(phone: &str) -> ServiceRecordSeed {
    ServiceRecordSeed {
        phone: phone.to_string(),
        patient: PatientIdentity {
            full_name: Some("Ana Torres".to_string()),
            document_type: Some("CC".to_string()),
            document_number: Some("52111222".to_string()),
            eps: Some("Cosalud".to_string()),
            phone: None,
        },
        service: ServiceDetails {
            service_type: Some("Diálisis".to_string()),
            appointment_date: Some("2024-01-20".to_string()),
            appointment_time: Some("07:00".to_string()),
            pickup_address: Some("Calle 12 #4-56".to_string()),
            ..Default::default()
        },
        contact_name: None,
        contact_relationship: None,
        special_observations: None,
        record_row: None,
    }
}

fn harness(provider: MockModelProvider, records: Vec<ServiceRecordSeed>) -> Harness {
    let store = Arc::new(InMemorySessionStore::new());
    let records = Arc::new(InMemoryRecordSource::with_records(records));
    let library = Arc::new(ReferenceLibrary::builtin());
    let executor = TurnExecutor::new(
        Arc::new(provider.clone()),
        ContextAssembler::new(library, PolicyGuard::default()),
        PolicyGuard::default(),
        ExecutorOptions::default(),
    );
    let coordinator = CallCoordinator::new(
        executor,
        store.clone(),
        Some(records.clone() as Arc<dyn ServiceRecordSource>),
        AgentProfile::default(),
    );
    Harness {
        coordinator,
        store,
        records,
        provider,
    }
}

fn turn_json(response: &str, next_phase: &str) -> String {
    format!(
        r#"{{"agent_response": "{}", "next_phase": "{}", "requires_escalation": false, "extracted": {{}}}}"#,
        response, next_phase
    )
}

// Scenario A: a new outbound session starts in OUTBOUND_GREETING and opens
// with an identity question, never with service details.
#[tokio::test]
async fn outbound_call_opens_with_identity_question() {
    let provider = MockModelProvider::new().with_response(turn_json(
        "Buenos días, ¿hablo con la señora Ana Torres o con un familiar?",
        "OUTBOUND_GREETING",
    ));
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let response = h.coordinator.start_outbound("3001234567").await.unwrap();

    assert_eq!(response.phase, ConversationPhase::OutboundGreeting);
    assert!(response.agent_response.contains("Ana Torres"));
    assert!(response.agent_response.contains('¿'));
    assert!(!response.agent_response.contains("2024"));
    assert!(!response.agent_response.contains("07:00"));
    assert!(!response.agent_response.contains("Calle 12"));

    let session = h.store.get(&response.session_id).await.unwrap().unwrap();
    assert_eq!(session.service.service_type.as_deref(), Some("Diálisis"));
    assert_eq!(
        session.service.appointment_date.as_deref(),
        Some("2024-01-20")
    );
}

// Scenario B: "Sí, confirmo" during confirmation marks the service
// confirmed and advances to closing.
#[tokio::test]
async fn confirmation_marks_service_confirmed_and_advances() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response(
            r#"{"agent_response": "Perfecto, su servicio queda confirmado. Pasemos al cierre.",
                "next_phase": "OUTBOUND_CLOSING",
                "extracted": {"operational": {"service_confirmed": true,
                "confirmation_status": "Confirmado"}}}"#,
        );
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();

    // Walk the stored session up to the confirmation phase
    let mut session = h.store.get(&started.session_id).await.unwrap().unwrap();
    session.phase = ConversationPhase::OutboundServiceConfirmation;
    assert!(!session.service_confirmed);
    h.store.save(&session).await.unwrap();

    let response = h
        .coordinator
        .handle_message(&started.session_id, CallDirection::Outbound, "Sí, confirmo")
        .await
        .unwrap();

    assert_eq!(response.phase, ConversationPhase::OutboundClosing);
    let session = h.store.get(&started.session_id).await.unwrap().unwrap();
    assert!(session.service_confirmed);
    assert_eq!(session.confirmation_status, ConfirmationStatus::Confirmado);
}

// Scenario C: a contact who declares age 15 never advances past the
// greeting, escalation is raised, and no appointment details leak.
#[tokio::test]
async fn minor_contact_is_held_at_greeting_without_details() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response(
            r#"{"agent_response": "Gracias. Su cita de diálisis es el 20 de enero a las 07:00.",
                "next_phase": "OUTBOUND_LEGAL_NOTICE",
                "extracted": {"identity": {"contact_relationship": "hija", "contact_age": 15}}}"#,
        );
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();
    let response = h
        .coordinator
        .handle_message(
            &started.session_id,
            CallDirection::Outbound,
            "Soy la hija, tengo 15 años",
        )
        .await
        .unwrap();

    assert_eq!(response.phase, ConversationPhase::OutboundGreeting);
    assert!(response.requires_escalation);
    assert!(!response.agent_response.contains("diálisis"));
    assert!(!response.agent_response.contains("20 de enero"));
    assert!(!response.agent_response.contains("07:00"));

    let session = h.store.get(&started.session_id).await.unwrap().unwrap();
    assert_eq!(session.contact.age, Some(15));
    assert!(session.requires_escalation);
}

// Scenario D: an out-of-zone pickup address forces "Zona sin cobertura"
// regardless of the model's proposed transition.
#[tokio::test]
async fn out_of_zone_address_overrides_confirmation() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response(
            r#"{"agent_response": "Listo, su servicio queda confirmado para el sábado.",
                "next_phase": "OUTBOUND_LEGAL_NOTICE",
                "extracted": {"service": {"pickup_address": "Vereda La Esperanza, km 12"},
                "operational": {"service_confirmed": true}}}"#,
        );
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();
    let response = h
        .coordinator
        .handle_message(
            &started.session_id,
            CallDirection::Outbound,
            "La dirección es Vereda La Esperanza, km 12",
        )
        .await
        .unwrap();

    assert!(response.requires_escalation);
    let session = h.store.get(&started.session_id).await.unwrap().unwrap();
    assert_eq!(
        session.confirmation_status,
        ConfirmationStatus::ZonaSinCobertura
    );
    assert!(!session.service_confirmed);
    assert!(session.coverage_issue);
}

// Scenario E: malformed model output leaves the phase untouched and the
// fixed fallback is spoken.
#[tokio::test]
async fn malformed_model_output_degrades_to_fallback() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response("esto no es json {roto");
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();
    let phase_before = started.phase;

    let response = h
        .coordinator
        .handle_message(&started.session_id, CallDirection::Outbound, "¿Aló?")
        .await
        .unwrap();

    assert_eq!(response.agent_response, FALLBACK_RESPONSE);
    assert_eq!(response.phase, phase_before);
    assert!(response.metadata.parse_error);
}

// Round-trip property: a stored and reloaded session is equal to the
// original, with message order preserved.
#[tokio::test]
async fn session_round_trips_through_store_mid_conversation() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response(turn_json("Le comento que la llamada es grabada", "OUTBOUND_LEGAL_NOTICE"));
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();
    h.coordinator
        .handle_message(&started.session_id, CallDirection::Outbound, "Sí, con ella")
        .await
        .unwrap();

    let loaded = h.store.get(&started.session_id).await.unwrap().unwrap();
    let json = serde_json::to_string(&loaded).unwrap();
    let reloaded: medroute::domain::conversation::ConversationSession =
        serde_json::from_str(&json).unwrap();

    assert_eq!(loaded, reloaded);
    let roles: Vec<_> = reloaded.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles.len(), 3); // greeting, user reply, agent reply
    assert_eq!(loaded.messages.len(), reloaded.messages.len());
}

// Missing sessions: inbound is recreated, outbound is a structured error.
#[tokio::test]
async fn missing_session_semantics_differ_by_direction() {
    let provider =
        MockModelProvider::new().with_response(turn_json("Buenos días", "GREETING"));
    let h = harness(provider, vec![]);

    let unknown = SessionId::new();
    let inbound = h
        .coordinator
        .handle_message(&unknown, CallDirection::Inbound, "hola")
        .await;
    assert!(inbound.is_ok());

    let unknown = SessionId::new();
    let outbound = h
        .coordinator
        .handle_message(&unknown, CallDirection::Outbound, "hola")
        .await;
    assert!(matches!(
        outbound,
        Err(CoordinatorError::SessionNotFound { .. })
    ));
}

// A full outbound happy path: greeting -> legal notice -> confirmation ->
// closing -> END, with the outcome written back to the record.
#[tokio::test]
async fn full_outbound_flow_writes_outcome_to_record() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días, ¿hablo con Ana Torres?", "OUTBOUND_GREETING"))
        .with_response(turn_json(
            "Gracias. Le informo que esta llamada está siendo grabada.",
            "OUTBOUND_LEGAL_NOTICE",
        ))
        .with_response(
            r#"{"agent_response": "Su diálisis es el sábado a las 07:00. ¿Confirma el servicio?",
                "next_phase": "OUTBOUND_SERVICE_CONFIRMATION", "extracted": {}}"#,
        )
        .with_response(
            r#"{"agent_response": "Queda confirmado. Paso al cierre.",
                "next_phase": "OUTBOUND_CLOSING",
                "extracted": {"operational": {"service_confirmed": true,
                "confirmation_status": "Confirmado"}}}"#,
        )
        .with_response(turn_json("Gracias por su tiempo, que tenga buen día.", "END"));
    let h = harness(provider, vec![dialysis_record("3001234567")]);

    let started = h.coordinator.start_outbound("3001234567").await.unwrap();
    let id = started.session_id;

    for message in ["Sí, con ella", "De acuerdo", "Sí, confirmo", "Gracias, hasta luego"] {
        h.coordinator
            .handle_message(&id, CallDirection::Outbound, message)
            .await
            .unwrap();
    }

    let session = h.store.get(&id).await.unwrap().unwrap();
    assert_eq!(session.phase, ConversationPhase::End);
    assert!(session.legal_notice_acknowledged);
    assert!(session.service_confirmed);

    let (status, observations) = h.records.outcome(0).unwrap();
    assert_eq!(status, ConfirmationStatus::Confirmado);
    assert!(observations.contains("Servicio confirmado"));

    // Five model calls: one per turn, none retried
    assert_eq!(h.provider.call_count(), 5);
}

// The phase graph is never violated across a whole conversation, even when
// the model keeps proposing illegal jumps.
#[tokio::test]
async fn illegal_jumps_are_rejected_across_turns() {
    let provider = MockModelProvider::new()
        .with_response(turn_json("Buenos días", "GREETING"))
        .with_response(turn_json("Hasta luego", "CLOSING"))
        .with_response(turn_json("Encuesta rápida", "SURVEY"))
        .with_response(turn_json("¿Su nombre?", "IDENTIFICATION"));
    let h = harness(provider, vec![]);

    let session = h.coordinator.start_inbound().await.unwrap();
    let id = session.session_id;

    let mut phases = Vec::new();
    for message in ["hola", "adiós", "ok", "soy Carlos"] {
        let response = h
            .coordinator
            .handle_message(&id, CallDirection::Inbound, message)
            .await
            .unwrap();
        phases.push(response.phase);
    }

    assert_eq!(
        phases,
        vec![
            ConversationPhase::Greeting,       // no-op turn
            ConversationPhase::Greeting,       // CLOSING rejected
            ConversationPhase::Greeting,       // SURVEY rejected
            ConversationPhase::Identification, // legal edge
        ]
    );
}
