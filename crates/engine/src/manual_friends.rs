//! Manual friends: people without an account.
//!
//! A manual friend belongs to the user who created it and is invisible to
//! every other account. Names are not unique; two rows with the same name
//! are two different people.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, Person, PersonProfile, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualFriend {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl ManualFriend {
    pub fn new(owner_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            name,
            created_at: Utc::now(),
        }
    }

    pub fn person(&self) -> Person {
        Person::Manual {
            id: self.id,
            owner_id: self.owner_id,
        }
    }

    pub fn profile(&self) -> PersonProfile {
        PersonProfile {
            person: self.person(),
            display_name: self.name.clone(),
            email: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "manual_friends")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Owner,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ManualFriend> for ActiveModel {
    fn from(friend: &ManualFriend) -> Self {
        Self {
            id: ActiveValue::Set(friend.id.to_string()),
            user_id: ActiveValue::Set(friend.owner_id.to_string()),
            name: ActiveValue::Set(friend.name.clone()),
            created_at: ActiveValue::Set(friend.created_at),
        }
    }
}

impl TryFrom<Model> for ManualFriend {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "manual friend")?,
            owner_id: parse_uuid(&model.user_id, "user")?,
            name: model.name,
            created_at: model.created_at,
        })
    }
}
