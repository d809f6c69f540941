//! Expense shares.
//!
//! A share is the portion of an expense owed by one person. Shares are
//! written together with their expense; `paid` is the only field that
//! changes afterwards, and shares are deleted only with their expense.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, MoneyCents, PersonRef, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub person: PersonRef,
    pub amount: MoneyCents,
    pub paid: bool,
}

impl ExpenseShare {
    pub fn new(expense_id: Uuid, person: PersonRef, amount: MoneyCents) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            person,
            amount,
            paid: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expense_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub registered_user_id: Option<String>,
    pub manual_friend_id: Option<String>,
    pub is_manual_friend: bool,
    pub amount_minor: i64,
    pub paid: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ExpenseShare> for ActiveModel {
    fn from(share: &ExpenseShare) -> Self {
        let (is_manual_friend, registered_user_id, manual_friend_id) = share.person.to_columns();
        Self {
            id: ActiveValue::Set(share.id.to_string()),
            expense_id: ActiveValue::Set(share.expense_id.to_string()),
            registered_user_id: ActiveValue::Set(registered_user_id),
            manual_friend_id: ActiveValue::Set(manual_friend_id),
            is_manual_friend: ActiveValue::Set(is_manual_friend),
            amount_minor: ActiveValue::Set(share.amount.cents()),
            paid: ActiveValue::Set(share.paid),
        }
    }
}

impl TryFrom<Model> for ExpenseShare {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let person = PersonRef::from_columns(
            model.is_manual_friend,
            model.registered_user_id.as_deref(),
            model.manual_friend_id.as_deref(),
        )?;
        Ok(Self {
            id: parse_uuid(&model.id, "share")?,
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            person,
            amount: MoneyCents::new(model.amount_minor),
            paid: model.paid,
        })
    }
}

/// Filter matching shares that reference `person`.
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
