//! Agent identity and session configuration.

use serde::Deserialize;

use crate::domain::conversation::AgentProfile;

use super::error::ValidationError;

/// Agent configuration: who the agent is and session limits.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Agent name used in greetings.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Transport company the agent represents.
    #[serde(default = "default_company_name")]
    pub company_name: String,

    /// The EPS that authorizes services.
    #[serde(default = "default_eps_name")]
    pub eps_name: String,

    /// Maximum turns per conversation.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Session TTL in the store, in seconds.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl AgentConfig {
    /// Builds the per-session profile from this configuration.
    pub fn profile(&self) -> AgentProfile {
        AgentProfile {
            agent_name: self.agent_name.clone(),
            company_name: self.company_name.clone(),
            eps_name: self.eps_name.clone(),
        }
    }

    /// Validates the agent configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.agent_name.trim().is_empty() {
            return Err(ValidationError::MissingRequired("agent_name"));
        }
        if self.max_turns == 0 {
            return Err(ValidationError::InvalidMaxTurns);
        }
        if self.session_ttl_secs == 0 {
            return Err(ValidationError::InvalidSessionTtl);
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent_name: default_agent_name(),
            company_name: default_company_name(),
            eps_name: default_eps_name(),
            max_turns: default_max_turns(),
            session_ttl_secs: default_session_ttl(),
        }
    }
}

fn default_agent_name() -> String {
    "María".to_string()
}

fn default_company_name() -> String {
    "Transformas".to_string()
}

fn default_eps_name() -> String {
    "Cosalud".to_string()
}

fn default_max_turns() -> u32 {
    50
}

fn default_session_ttl() -> u64 {
    3600
}
