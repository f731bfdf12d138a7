//! Process-wide agent identity.

use std::fmt::{self, Display, Formatter};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies this process within the mesh.
///
/// Takes the form `{name}-{8-hex}` when a name was supplied, else
/// `agent-{8-hex}`. Generated lazily on first use and constant thereafter —
/// see [`AgentIdentity::current`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentIdentity(String);

impl AgentIdentity {
    /// Generates a fresh identity with the given name prefix (`None` falls
    /// back to `agent`).
    #[must_use]
    pub fn generate(name: Option<&str>) -> Self {
        let suffix = &Uuid::new_v4().simple().to_string()[..8];
        let prefix = name.filter(|n| !n.trim().is_empty()).unwrap_or("agent");
        Self(format!("{prefix}-{suffix}"))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AgentIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<AgentIdentity> for String {
    fn from(value: AgentIdentity) -> Self {
        value.0
    }
}

static PROCESS_IDENTITY: OnceLock<AgentIdentity> = OnceLock::new();

/// Returns the single, process-wide agent identity, generating it from
/// `name` the first time it is called. Subsequent calls ignore `name` and
/// return the already-established identity — exactly one identity exists
/// per process for its lifetime.
pub fn process_identity(name: Option<&str>) -> AgentIdentity {
    PROCESS_IDENTITY
        .get_or_init(|| AgentIdentity::generate(name))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_named_identity() {
        let id = AgentIdentity::generate(Some("greeter"));
        assert!(id.as_str().starts_with("greeter-"));
        assert_eq!(id.as_str().len(), "greeter-".len() + 8);
    }

    #[test]
    fn falls_back_to_agent_prefix() {
        let id = AgentIdentity::generate(None);
        assert!(id.as_str().starts_with("agent-"));
    }

    #[test]
    fn process_identity_is_stable() {
        let first = process_identity(Some("whatever-first-call-wins"));
        let second = process_identity(Some("ignored"));
        assert_eq!(first, second);
    }
}
