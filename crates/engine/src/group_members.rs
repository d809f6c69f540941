//! Group rosters.
//!
//! Each row attaches one person (registered user or manual friend) to a
//! group. The group creator is always the first member.

use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{PersonRef, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub registered_user_id: Option<String>,
    pub manual_friend_id: Option<String>,
    pub is_manual_friend: bool,
}

impl Model {
    pub(crate) fn person(&self) -> ResultEngine<PersonRef> {
        PersonRef::from_columns(
            self.is_manual_friend,
            self.registered_user_id.as_deref(),
            self.manual_friend_id.as_deref(),
        )
    }

    pub(crate) fn group_uuid(&self) -> ResultEngine<Uuid> {
        parse_uuid(&self.group_id, "group")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Builds a membership row for `person` in `group_id`.
pub(crate) fn membership(group_id: Uuid, person: PersonRef) -> ActiveModel {
    let (is_manual_friend, registered_user_id, manual_friend_id) = person.to_columns();
    ActiveModel {
        id: ActiveValue::Set(Uuid::new_v4().to_string()),
        group_id: ActiveValue::Set(group_id.to_string()),
        registered_user_id: ActiveValue::Set(registered_user_id),
        manual_friend_id: ActiveValue::Set(manual_friend_id),
        is_manual_friend: ActiveValue::Set(is_manual_friend),
    }
}

/// Filter matching rows that reference `person`.
pub(crate) fn references(person: PersonRef) -> sea_orm::Condition {
    match person {
        PersonRef::Registered(id) => sea_orm::Condition::all()
            .add(Column::IsManualFriend.eq(false))
            .add(Column::RegisteredUserId.eq(id.to_string())),
        PersonRef::Manual(id) => sea_orm::Condition::all()
            .add(Column::IsManualFriend.eq(true))
            .add(Column::ManualFriendId.eq(id.to_string())),
    }
}
