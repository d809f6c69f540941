//! Expenses and their display-ready aggregate.
//!
//! An `Expense` is paid by its creator and split into `ExpenseShare`s, one
//! per person who owes part of it. `group_id == None` marks a personal
//! expense split among explicitly chosen friends.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, MoneyCents, PersonProfile, ResultEngine, expense_shares::ExpenseShare,
    util::parse_uuid,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub total: MoneyCents,
    pub group_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        title: String,
        description: Option<String>,
        total: MoneyCents,
        group_id: Option<Uuid>,
        created_by: Uuid,
    ) -> ResultEngine<Self> {
        if !total.is_positive() {
            return Err(EngineError::Validation(
                "expense amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            title,
            description,
            total,
            group_id,
            created_by,
            created_at: Utc::now(),
        })
    }

    pub fn is_personal(&self) -> bool {
        self.group_id.is_none()
    }
}

/// An expense with everything a client renders, as seen by one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseView {
    pub expense: Expense,
    pub creator: PersonProfile,
    pub group_name: Option<String>,
    /// `true` when the viewing account created the expense.
    pub is_owner: bool,
    pub shares: Vec<ShareView>,
    /// The share owed by the viewing account, if any.
    pub user_share: Option<ShareView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareView {
    pub share: ExpenseShare,
    pub person: PersonProfile,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub group_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_shares::Entity")]
    Shares,
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::expense_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            title: ActiveValue::Set(expense.title.clone()),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.total.cents()),
            group_id: ActiveValue::Set(expense.group_id.map(|id| id.to_string())),
            created_by: ActiveValue::Set(expense.created_by.to_string()),
            created_at: ActiveValue::Set(expense.created_at),
        }
    }
}

impl TryFrom<Model> for Expense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            title: model.title,
            description: model.description,
            total: MoneyCents::new(model.amount_minor),
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            created_by: parse_uuid(&model.created_by, "user")?,
            created_at: model.created_at,
        })
    }
}
