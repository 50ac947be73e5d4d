use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};
use validator::Validate;

/// Kinds of records the coordination runtime stores
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Swarm,
    Agent,
    Task,
    Memory,
    NeuralNetwork,
    Metric,
}

/// A record handed to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Entity {
    pub kind: EntityKind,

    #[validate(length(min = 1, max = 256))]
    pub id: String,

    pub data: serde_json::Value,

    /// Time to live; `None` keeps the entity until deleted
    #[serde(default, with = "ttl_secs")]
    pub ttl: Option<Duration>,
}

impl Entity {
    pub fn new(kind: EntityKind, id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            id: id.into(),
            data,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Storage key: `kind:id`
    pub fn key(&self) -> String {
        entity_key(self.kind, &self.id)
    }

    /// Reject malformed records before they reach storage
    pub fn validate_shape(&self) -> Result<()> {
        self.validate()?;

        if self.id.contains(':') || self.id.chars().any(char::is_control) {
            return Err(AppError::Validation(format!(
                "id '{}' must not contain ':' or control characters",
                self.id.escape_debug()
            )));
        }
        if !self.data.is_object() {
            return Err(AppError::Validation(format!(
                "{} data must be a JSON object",
                self.key()
            )));
        }
        if self.ttl.map(|t| t.is_zero()).unwrap_or(false) {
            return Err(AppError::Validation(format!(
                "{} ttl must be greater than 0",
                self.key()
            )));
        }
        Ok(())
    }
}

pub fn entity_key(kind: EntityKind, id: &str) -> String {
    format!("{}:{}", kind, id)
}

/// Envelope persisted for each entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub kind: EntityKind,
    pub id: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntity {
    pub fn from_entity(entity: &Entity, now: DateTime<Utc>) -> Self {
        Self {
            kind: entity.kind,
            id: entity.id.clone(),
            data: entity.data.clone(),
            created_at: now,
            updated_at: now,
            expires_at: expiry(entity.ttl, now),
        }
    }

    /// Apply an update, keeping the original creation time
    pub fn updated(&self, entity: &Entity, now: DateTime<Utc>) -> Self {
        Self {
            data: entity.data.clone(),
            updated_at: now,
            expires_at: expiry(entity.ttl, now),
            ..self.clone()
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now >= at).unwrap_or(false)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| AppError::Corruption(e.to_string()))
    }
}

fn expiry(ttl: Option<Duration>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok())
        .map(|ttl| now + ttl)
}

mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(ttl: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match ttl {
            Some(ttl) => serializer.serialize_some(&ttl.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs
            .filter(|s| s.is_finite() && *s > 0.0)
            .map(Duration::from_secs_f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_format() {
        let entity = Entity::new(EntityKind::NeuralNetwork, "n1", json!({}));
        assert_eq!(entity.key(), "neural_network:n1");
    }

    #[test]
    fn test_shape_validation() {
        assert!(Entity::new(EntityKind::Agent, "a1", json!({"type": "coder"}))
            .validate_shape()
            .is_ok());

        let empty_id = Entity::new(EntityKind::Agent, "", json!({}));
        assert!(empty_id.validate_shape().unwrap_err().is_validation());

        let bad_id = Entity::new(EntityKind::Agent, "a:1", json!({}));
        assert!(bad_id.validate_shape().is_err());

        let not_object = Entity::new(EntityKind::Task, "t1", json!([1, 2]));
        assert!(not_object.validate_shape().is_err());

        let zero_ttl = Entity::new(EntityKind::Task, "t1", json!({})).with_ttl(Duration::ZERO);
        assert!(zero_ttl.validate_shape().is_err());
    }

    #[test]
    fn test_envelope_expiry_and_update() {
        let now = Utc::now();
        let entity = Entity::new(EntityKind::Memory, "m1", json!({"v": 1}))
            .with_ttl(Duration::from_secs(1));
        let stored = StoredEntity::from_entity(&entity, now);

        assert!(!stored.is_expired(now));
        assert!(stored.is_expired(now + chrono::Duration::milliseconds(1500)));

        let later = now + chrono::Duration::seconds(5);
        let updated = stored.updated(&Entity::new(EntityKind::Memory, "m1", json!({"v": 2})), later);
        assert_eq!(updated.created_at, now);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.expires_at, None);
    }

    #[test]
    fn test_garbage_bytes_are_corruption() {
        let err = StoredEntity::from_bytes(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::Corruption(_)));
    }

    #[test]
    fn test_entity_ttl_serializes_as_seconds() {
        let entity = Entity::new(EntityKind::Task, "t1", json!({})).with_ttl(Duration::from_secs(2));
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["ttl"], 2.0);
        let back: Entity = serde_json::from_value(value).unwrap();
        assert_eq!(back.ttl, Some(Duration::from_secs(2)));
    }
}
