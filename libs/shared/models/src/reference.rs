use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub trait Identified {
    fn id(&self) -> Uuid;
}

/// A field that holds either a bare id or the joined entity it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Ref<T> {
    Reference(Uuid),
    Resolved(T),
}

impl<T: Identified> Ref<T> {
    pub fn id(&self) -> Uuid {
        match self {
            Ref::Reference(id) => *id,
            Ref::Resolved(entity) => entity.id(),
        }
    }

    pub fn id_string(&self) -> String {
        self.id().to_string()
    }

    /// Resolve when the entity is known, otherwise keep the bare id.
    pub fn from_lookup(id: Uuid, entity: Option<T>) -> Self {
        match entity {
            Some(entity) => Ref::Resolved(entity),
            None => Ref::Reference(id),
        }
    }
}

impl<T> Ref<T> {
    pub fn resolved(&self) -> Option<&T> {
        match self {
            Ref::Reference(_) => None,
            Ref::Resolved(entity) => Some(entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Named {
        id: Uuid,
        name: String,
    }

    impl Identified for Named {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    #[test]
    fn test_both_variants_normalize_to_the_same_id() {
        let id = Uuid::new_v4();
        let bare: Ref<Named> = Ref::Reference(id);
        let joined = Ref::Resolved(Named { id, name: "Dr. Rao".to_string() });

        assert_eq!(bare.id_string(), joined.id_string());
        assert!(bare.resolved().is_none());
        assert_eq!(joined.resolved().map(|n| n.name.as_str()), Some("Dr. Rao"));
    }

    #[test]
    fn test_untagged_round_trip_accepts_string_or_object() {
        let id = Uuid::new_v4();
        let from_string: Ref<Named> = serde_json::from_value(serde_json::json!(id)).unwrap();
        assert_eq!(from_string, Ref::Reference(id));

        let from_object: Ref<Named> =
            serde_json::from_value(serde_json::json!({ "id": id, "name": "x" })).unwrap();
        assert_eq!(from_object.id(), id);
    }
}
