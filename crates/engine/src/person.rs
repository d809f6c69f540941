//! People an expense can be split with.
//!
//! A person is either a registered user or a manual friend (someone without
//! an account, tracked by the user who created them). Rows in
//! `group_members` and `expense_shares` store the reference as three
//! columns: `is_manual_friend`, `registered_user_id`, `manual_friend_id`.
//! [`PersonRef`] is the decoded form of those columns; the invalid
//! combinations (both ids set, neither set, or an id that disagrees with
//! the discriminator) cannot be represented.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// A stored reference to a person.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PersonRef {
    Registered(Uuid),
    Manual(Uuid),
}

impl PersonRef {
    /// The id of the referenced user or manual friend.
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            Self::Registered(id) | Self::Manual(id) => id,
        }
    }

    #[must_use]
    pub fn is_manual_friend(self) -> bool {
        matches!(self, Self::Manual(_))
    }

    /// Encodes the reference as `(is_manual_friend, registered_user_id,
    /// manual_friend_id)` column values.
    pub(crate) fn to_columns(self) -> (bool, Option<String>, Option<String>) {
        match self {
            Self::Registered(id) => (false, Some(id.to_string()), None),
            Self::Manual(id) => (true, None, Some(id.to_string())),
        }
    }

    /// Decodes the three person columns of a row.
    pub(crate) fn from_columns(
        is_manual_friend: bool,
        registered_user_id: Option<&str>,
        manual_friend_id: Option<&str>,
    ) -> ResultEngine<Self> {
        match (is_manual_friend, registered_user_id, manual_friend_id) {
            (false, Some(id), None) => Ok(Self::Registered(parse_uuid(id, "registered user")?)),
            (true, None, Some(id)) => Ok(Self::Manual(parse_uuid(id, "manual friend")?)),
            (_, Some(_), Some(_)) => Err(EngineError::InvalidPerson(
                "both registered_user_id and manual_friend_id are set".to_string(),
            )),
            (_, None, None) => Err(EngineError::InvalidPerson(
                "neither registered_user_id nor manual_friend_id is set".to_string(),
            )),
            (true, Some(_), None) => Err(EngineError::InvalidPerson(
                "manual friend flag set on a registered user reference".to_string(),
            )),
            (false, None, Some(_)) => Err(EngineError::InvalidPerson(
                "manual friend reference without the manual friend flag".to_string(),
            )),
        }
    }
}

/// A resolved person with a canonical identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Person {
    Registered { id: Uuid },
    /// Manual friends are scoped to `owner_id`: only that account sees them.
    Manual { id: Uuid, owner_id: Uuid },
}

impl Person {
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            Self::Registered { id } | Self::Manual { id, .. } => id,
        }
    }

    #[must_use]
    pub fn is_manual_friend(self) -> bool {
        matches!(self, Self::Manual { .. })
    }

    #[must_use]
    pub fn is_registered(self) -> bool {
        !self.is_manual_friend()
    }

    /// The reference stored in share and membership rows.
    #[must_use]
    pub fn to_ref(self) -> PersonRef {
        match self {
            Self::Registered { id } => PersonRef::Registered(id),
            Self::Manual { id, .. } => PersonRef::Manual(id),
        }
    }
}

impl From<Person> for PersonRef {
    fn from(person: Person) -> Self {
        person.to_ref()
    }
}

/// A person ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonProfile {
    pub person: Person,
    pub display_name: String,
    /// Only registered users have an email.
    pub email: Option<String>,
}

impl PersonProfile {
    pub fn id(&self) -> Uuid {
        self.person.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_round_trip_both_variants() {
        let id = Uuid::new_v4();
        for person in [PersonRef::Registered(id), PersonRef::Manual(id)] {
            let (manual, registered, manual_id) = person.to_columns();
            let decoded =
                PersonRef::from_columns(manual, registered.as_deref(), manual_id.as_deref())
                    .unwrap();
            assert_eq!(decoded, person);
        }
    }

    #[test]
    fn from_columns_rejects_both_or_neither() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            PersonRef::from_columns(false, Some(&id), Some(&id)),
            Err(EngineError::InvalidPerson(_))
        ));
        assert!(matches!(
            PersonRef::from_columns(true, None, None),
            Err(EngineError::InvalidPerson(_))
        ));
    }

    #[test]
    fn from_columns_rejects_flag_mismatch() {
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            PersonRef::from_columns(true, Some(&id), None),
            Err(EngineError::InvalidPerson(_))
        ));
        assert!(matches!(
            PersonRef::from_columns(false, None, Some(&id)),
            Err(EngineError::InvalidPerson(_))
        ));
    }

    #[test]
    fn from_columns_rejects_malformed_id() {
        assert!(matches!(
            PersonRef::from_columns(false, Some("not-a-uuid"), None),
            Err(EngineError::InvalidId(_))
        ));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let id = Uuid::new_v4();
        assert_eq!(
            serde_json::to_value(PersonRef::Manual(id)).unwrap(),
            serde_json::json!({ "kind": "manual", "id": id })
        );
        assert_eq!(
            serde_json::to_value(Person::Registered { id }).unwrap(),
            serde_json::json!({ "kind": "registered", "id": id })
        );
    }
}
