//! Coverage zone and guard configuration.

use serde::Deserialize;

use crate::domain::conversation::GuardConfig;

/// Coverage zone configuration for the policy guard.
#[derive(Debug, Clone, Deserialize)]
pub struct CoverageConfig {
    /// Address fragments that mark a pickup as rural / out of zone.
    #[serde(default = "default_rural_keywords")]
    pub rural_keywords: Vec<String>,

    /// Cities outside the operational area.
    #[serde(default = "default_excluded_cities")]
    pub excluded_cities: Vec<String>,

    /// Maximum companions without EPS authorization.
    #[serde(default = "default_max_companions")]
    pub max_companions: u8,
}

impl CoverageConfig {
    /// Builds the guard configuration, taking the authorized EPS from the
    /// agent configuration.
    pub fn guard_config(&self, authorized_eps: &str) -> GuardConfig {
        GuardConfig {
            authorized_eps: authorized_eps.to_string(),
            rural_keywords: self.rural_keywords.clone(),
            excluded_cities: self.excluded_cities.clone(),
            max_companions: self.max_companions,
        }
    }
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            rural_keywords: default_rural_keywords(),
            excluded_cities: default_excluded_cities(),
            max_companions: default_max_companions(),
        }
    }
}

fn default_rural_keywords() -> Vec<String> {
    ["vereda", "rural", "corregimiento", "campo", " km "]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excluded_cities() -> Vec<String> {
    ["bogotá", "cali", "cartagena", "barranquilla"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_companions() -> u8 {
    1
}
