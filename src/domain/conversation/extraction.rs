//! Typed per-turn data extraction.
//!
//! The model reports fields it identified in the current turn as a partial
//! update scoped by category. Unknown keys are rejected at parse time rather
//! than accepted as arbitrary dynamic fields, so a drifting model cannot
//! invent state.

use serde::{Deserialize, Deserializer, Serialize};

use super::session::ConfirmationStatus;

/// Structured partial update produced by one conversation turn.
///
/// All fields are optional; absent or empty values never clear existing
/// session state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractedFields {
    #[serde(default)]
    pub identity: IdentityUpdate,
    #[serde(default)]
    pub service: ServiceUpdate,
    #[serde(default)]
    pub operational: OperationalUpdate,
}

impl ExtractedFields {
    /// Returns true if no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.identity == IdentityUpdate::default()
            && self.service == ServiceUpdate::default()
            && self.operational == OperationalUpdate::default()
    }
}

/// Identity fields the turn may have surfaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityUpdate {
    pub patient_full_name: Option<String>,
    pub document_type: Option<String>,
    pub document_number: Option<String>,
    pub eps: Option<String>,
    pub contact_name: Option<String>,
    pub contact_relationship: Option<String>,
    /// Age as stated by the contact. Models sometimes return this as a
    /// string; both forms are accepted, anything unparseable is dropped.
    #[serde(default, deserialize_with = "deserialize_loose_age")]
    pub contact_age: Option<u8>,
}

/// Service fields the turn may have surfaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceUpdate {
    pub service_type: Option<String>,
    pub treatment_type: Option<String>,
    pub frequency: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub pickup_address: Option<String>,
    pub destination: Option<String>,
    pub transport_modality: Option<String>,
    pub companion_count: Option<u8>,
}

/// Operational flags the turn may have surfaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OperationalUpdate {
    pub service_confirmed: Option<bool>,
    pub confirmation_status: Option<ConfirmationStatus>,
    pub date_change_requested: Option<bool>,
    pub new_appointment_date: Option<String>,
    pub patient_away: Option<bool>,
    pub patient_return_date: Option<String>,
    pub wrong_number: Option<bool>,
    pub adult_confirmed: Option<bool>,
    #[serde(default)]
    pub special_needs: Vec<String>,
    pub incident_summary: Option<String>,
}

/// Accepts `17`, `"17"`, or `null`; anything else becomes `None`.
fn deserialize_loose_age<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LooseAge {
        Number(u64),
        Text(String),
        Null(Option<()>),
    }

    let age = match LooseAge::deserialize(deserializer)? {
        LooseAge::Number(n) => u8::try_from(n).ok(),
        LooseAge::Text(s) => s.trim().parse::<u8>().ok(),
        LooseAge::Null(_) => None,
    };
    Ok(age)
}

/// Returns the value if it is non-empty after trimming.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parsing {
        use super::*;

        #[test]
        fn empty_object_is_default() {
            let fields: ExtractedFields = serde_json::from_str("{}").unwrap();
            assert!(fields.is_empty());
        }

        #[test]
        fn parses_categorized_fields() {
            let json = r#"{
                "identity": {"contact_relationship": "hija", "contact_age": 15},
                "service": {"appointment_date": "2024-01-20"},
                "operational": {"service_confirmed": true}
            }"#;
            let fields: ExtractedFields = serde_json::from_str(json).unwrap();
            assert_eq!(fields.identity.contact_relationship.as_deref(), Some("hija"));
            assert_eq!(fields.identity.contact_age, Some(15));
            assert_eq!(fields.service.appointment_date.as_deref(), Some("2024-01-20"));
            assert_eq!(fields.operational.service_confirmed, Some(true));
        }

        #[test]
        fn rejects_unknown_top_level_key() {
            let json = r#"{"identity": {}, "mystery": {}}"#;
            let result: Result<ExtractedFields, _> = serde_json::from_str(json);
            assert!(result.is_err());
        }

        #[test]
        fn rejects_unknown_identity_key() {
            let json = r#"{"identity": {"favorite_color": "azul"}}"#;
            let result: Result<ExtractedFields, _> = serde_json::from_str(json);
            assert!(result.is_err());
        }

        #[test]
        fn accepts_age_as_string() {
            let json = r#"{"identity": {"contact_age": "17"}}"#;
            let fields: ExtractedFields = serde_json::from_str(json).unwrap();
            assert_eq!(fields.identity.contact_age, Some(17));
        }

        #[test]
        fn unparseable_age_becomes_none() {
            let json = r#"{"identity": {"contact_age": "unos cuantos"}}"#;
            let fields: ExtractedFields = serde_json::from_str(json).unwrap();
            assert_eq!(fields.identity.contact_age, None);
        }

        #[test]
        fn null_age_is_none() {
            let json = r#"{"identity": {"contact_age": null}}"#;
            let fields: ExtractedFields = serde_json::from_str(json).unwrap();
            assert_eq!(fields.identity.contact_age, None);
        }
    }

    mod non_empty_helper {
        use super::*;

        #[test]
        fn filters_empty_and_whitespace() {
            assert_eq!(non_empty(&Some("  ".to_string())), None);
            assert_eq!(non_empty(&Some(String::new())), None);
            assert_eq!(non_empty(&None), None);
        }

        #[test]
        fn filters_literal_null() {
            assert_eq!(non_empty(&Some("null".to_string())), None);
            assert_eq!(non_empty(&Some("NULL".to_string())), None);
        }

        #[test]
        fn passes_real_values_trimmed() {
            assert_eq!(non_empty(&Some(" Calle 12 ".to_string())), Some("Calle 12"));
        }
    }
}
