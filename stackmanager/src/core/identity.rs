//! Coordinator identity state
//!
//! Resolution runs `NoId → IdRequested → IdKnown → NameRequested → NameKnown`.
//! `IdKnown(None)` is terminal for an automatic chain: the coordinator
//! answered, but not with something usable.

use serde_json::Value;
use uuid::Uuid;

/// Scheme prefix of user-facing coordinator addresses
pub const ADDRESS_SCHEME: &str = "hifi";

/// Name shown until the directory service tells us better
pub const DEFAULT_NAME: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentityPhase {
    #[default]
    NoId,
    IdRequested,
    IdKnown(Option<Uuid>),
    NameRequested(Uuid),
    NameKnown(Uuid),
}

impl IdentityPhase {
    /// A chain is currently waiting on the network
    pub fn in_flight(&self) -> bool {
        matches!(self, IdentityPhase::IdRequested | IdentityPhase::NameRequested(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorIdentity {
    pub phase: IdentityPhase,
    pub name: String,
}

impl Default for CoordinatorIdentity {
    fn default() -> Self {
        Self {
            phase: IdentityPhase::NoId,
            name: DEFAULT_NAME.to_string(),
        }
    }
}

impl CoordinatorIdentity {
    pub fn id(&self) -> Option<Uuid> {
        match self.phase {
            IdentityPhase::IdKnown(id) => id,
            IdentityPhase::NameRequested(id) | IdentityPhase::NameKnown(id) => Some(id),
            IdentityPhase::NoId | IdentityPhase::IdRequested => None,
        }
    }

    pub fn address(&self) -> String {
        format!("{ADDRESS_SCHEME}://{}", self.name)
    }
}

/// Parse the body of the coordinator's `/id` endpoint
///
/// Accepts any textual UUID form; the nil UUID counts as missing.
pub fn parse_coordinator_id(body: &[u8]) -> Option<Uuid> {
    let text = std::str::from_utf8(body).ok()?.trim();
    Uuid::parse_str(text).ok().filter(|id| !id.is_nil())
}

/// Pull a display name out of a directory service `/domains/{id}` response
///
/// Uses `domain.name`, falling back to the first of `domain.owner_places`.
pub fn extract_domain_name(body: &[u8]) -> Option<String> {
    let document: Value = serde_json::from_slice(body).ok()?;
    let domain = document.get("domain")?;

    let name = match domain.get("name") {
        Some(name) => name.as_str(),
        None => domain
            .get("owner_places")?
            .as_array()?
            .first()?
            .get("name")?
            .as_str(),
    }?;

    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
