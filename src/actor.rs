//! Creator/updater references.
//!
//! Pages, widgets and content items may be authored either by a site user or
//! by an admin. The reference is stored as two columns (`*_type`, `*_id`) and
//! surfaced as an explicit tagged value.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    Admin,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ActorType::User),
            "admin" => Some(ActorType::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    pub actor_type: ActorType,
    pub actor_id: i64,
}

impl ActorRef {
    pub fn user(id: i64) -> Self {
        Self {
            actor_type: ActorType::User,
            actor_id: id,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self {
            actor_type: ActorType::Admin,
            actor_id: id,
        }
    }

    /// Rebuild a reference from its two storage columns. Both must be present
    /// and the type must be a known actor kind.
    pub(crate) fn from_columns(actor_type: Option<String>, actor_id: Option<i64>) -> Option<Self> {
        let actor_type = ActorType::parse(actor_type.as_deref()?)?;
        Some(Self {
            actor_type,
            actor_id: actor_id?,
        })
    }

    pub(crate) fn into_columns(actor: Option<ActorRef>) -> (Option<&'static str>, Option<i64>) {
        match actor {
            Some(a) => (Some(a.actor_type.as_str()), Some(a.actor_id)),
            None => (None, None),
        }
    }
}

impl std::fmt::Display for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.actor_type.as_str(), self.actor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns_requires_both_parts() {
        assert_eq!(
            ActorRef::from_columns(Some("admin".into()), Some(4)),
            Some(ActorRef::admin(4))
        );
        assert_eq!(ActorRef::from_columns(Some("admin".into()), None), None);
        assert_eq!(ActorRef::from_columns(None, Some(4)), None);
        assert_eq!(ActorRef::from_columns(Some("robot".into()), Some(4)), None);
    }

    #[test]
    fn test_actor_ref_serializes_tagged() {
        let json = serde_json::to_value(ActorRef::user(7)).unwrap();
        assert_eq!(json, serde_json::json!({ "actorType": "user", "actorId": 7 }));
    }
}
