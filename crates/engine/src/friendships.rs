//! Friendships between registered users.
//!
//! Stored as a directed edge (`user_id` added `friend_id`) but read as
//! symmetric once accepted. `add_friend` always writes accepted rows;
//! pending rows can only come from other clients and are ignored.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
}

impl FriendshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl TryFrom<&str> for FriendshipStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            other => Err(EngineError::Validation(format!(
                "invalid friendship status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "friendships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub user_id: String,
    pub friend_id: String,
    pub status: String,
    pub created_at: DateTimeUtc,
}

impl Model {
    /// The side of the edge that is not `account_id`.
    pub(crate) fn other_side(&self, account_id: Uuid) -> ResultEngine<Uuid> {
        let user_id = parse_uuid(&self.user_id, "user")?;
        if user_id == account_id {
            parse_uuid(&self.friend_id, "friend")
        } else {
            Ok(user_id)
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Builds an accepted edge from `user_id` to `friend_id`.
pub(crate) fn accepted(user_id: Uuid, friend_id: Uuid) -> ActiveModel {
    ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        user_id: ActiveValue::Set(user_id.to_string()),
        friend_id: ActiveValue::Set(friend_id.to_string()),
        status: ActiveValue::Set(FriendshipStatus::Accepted.as_str().to_string()),
        created_at: ActiveValue::Set(chrono::Utc::now()),
    }
}
