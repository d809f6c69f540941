use std::collections::HashMap;

use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
    prelude::*,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    Allocation, EngineError, Expense, ExpenseShare, ExpenseView, MoneyCents, PersonRef,
    ReconciliationMode, ResultEngine, Session, ShareView, Table, check_reconciliation,
    expense_shares, expenses, groups,
    util::{normalize_optional_text, normalize_required_text, parse_uuid},
};

use super::{
    Engine,
    access::{any_reference, unknown_profile},
    with_tx,
};

/// Input of [`Engine::create_expense`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewExpense {
    pub title: String,
    pub description: Option<String>,
    pub total: MoneyCents,
    /// `None` for a personal expense.
    pub group_id: Option<Uuid>,
    /// Owed amount per person, usually the output of [`crate::allocate`].
    pub shares: Allocation,
}

impl Engine {
    /// Stores an expense paid by the account together with its shares.
    ///
    /// Registered share holders must exist; manual share holders must be
    /// manual friends of the account. For a group expense the account must
    /// belong to the group. Shares that do not add up to the total are
    /// logged, or rejected under [`ReconciliationMode::Strict`].
    pub async fn create_expense(
        &self,
        session: &Session,
        input: NewExpense,
    ) -> ResultEngine<Expense> {
        let account_id = session.account_id();
        let title = normalize_required_text(&input.title, "title")?;
        let description = normalize_optional_text(input.description.as_deref());
        let expense = Expense::new(title, description, input.total, input.group_id, account_id)?;

        if input.shares.is_empty() {
            return Err(EngineError::Validation(
                "expense needs at least one share".to_string(),
            ));
        }
        if input.shares.values().any(|amount| amount.is_negative()) {
            return Err(EngineError::Validation(
                "share amounts must not be negative".to_string(),
            ));
        }
        let reconciliation = check_reconciliation(expense.total, input.shares.values())?;
        if !reconciliation.is_exact() {
            match self.options.reconciliation {
                ReconciliationMode::Lenient => warn!(
                    total = %reconciliation.total,
                    allocated = %reconciliation.allocated,
                    gap = %reconciliation.gap,
                    "shares do not add up to the expense total"
                ),
                ReconciliationMode::Strict => {
                    return Err(EngineError::ShareMismatch(format!(
                        "shares sum to {} but the total is {}",
                        reconciliation.allocated, reconciliation.total
                    )));
                }
            }
        }

        let shares: Vec<ExpenseShare> = input
            .shares
            .iter()
            .map(|(person, amount)| ExpenseShare::new(expense.id, *person, *amount))
            .collect();

        let result: ResultEngine<()> = with_tx!(self, |db_tx| {
            if let Some(group_id) = expense.group_id {
                self.require_group(&db_tx, group_id).await?;
                let member = self
                    .account_group_ids(&db_tx, account_id)
                    .await?
                    .contains(&group_id.to_string());
                if !member {
                    return Err(EngineError::Forbidden(
                        "not a member of the group".to_string(),
                    ));
                }
            }
            for share in &shares {
                self.require_person_for(&db_tx, share.person, account_id)
                    .await?;
            }

            expenses::ActiveModel::from(&expense).insert(&db_tx).await?;
            for share in &shares {
                expense_shares::ActiveModel::from(share)
                    .insert(&db_tx)
                    .await?;
            }
            Ok(())
        });
        result?;

        info!(
            expense = %expense.id,
            total = %expense.total,
            shares = shares.len(),
            "expense created"
        );
        self.publish(&[Table::Expenses, Table::ExpenseShares]);
        Ok(expense)
    }

    /// Expenses the account created or holds a share in (directly, or
    /// through one of its manual friends), newest first.
    pub async fn list_visible_expenses(&self, session: &Session) -> ResultEngine<Vec<ExpenseView>> {
        let account_id = session.account_id();
        with_tx!(self, |db_tx| {
            let persons = self.account_persons(&db_tx, account_id).await?;
            let shared = expense_shares::Entity::find()
                .select_only()
                .column(expense_shares::Column::ExpenseId)
                .filter(any_reference(&persons, expense_shares::references))
                .into_query();

            let models = expenses::Entity::find()
                .filter(
                    Condition::any()
                        .add(expenses::Column::CreatedBy.eq(account_id.to_string()))
                        .add(expenses::Column::Id.in_subquery(shared)),
                )
                .order_by_desc(expenses::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            debug!(account = %account_id, expenses = models.len(), "visible expenses loaded");

            let visible: Vec<Expense> = models
                .into_iter()
                .filter_map(|model| {
                    let id = model.id.clone();
                    Expense::try_from(model)
                        .inspect_err(|err| warn!(expense = %id, %err, "skipping malformed expense"))
                        .ok()
                })
                .collect();

            let mut shares = self
                .load_shares(&db_tx, visible.iter().map(|e| e.id.to_string()).collect())
                .await?;

            let group_ids: Vec<String> = visible
                .iter()
                .filter_map(|e| e.group_id.map(|id| id.to_string()))
                .collect();
            let mut group_names: HashMap<String, String> = HashMap::new();
            if !group_ids.is_empty() {
                for group in groups::Entity::find()
                    .filter(groups::Column::Id.is_in(group_ids))
                    .all(&db_tx)
                    .await?
                {
                    group_names.insert(group.id, group.name);
                }
            }

            let people = visible
                .iter()
                .map(|e| PersonRef::Registered(e.created_by))
                .chain(shares.values().flatten().map(|s| s.person))
                .collect::<Vec<_>>();
            let profiles = self.resolve_profiles(&db_tx, people).await?;
            let me = PersonRef::Registered(account_id);

            let views = visible
                .into_iter()
                .map(|expense| {
                    let creator_ref = PersonRef::Registered(expense.created_by);
                    let creator = profiles
                        .get(&creator_ref)
                        .cloned()
                        .unwrap_or_else(|| unknown_profile(creator_ref, expense.created_by));
                    let share_views: Vec<ShareView> = shares
                        .remove(&expense.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(|share| ShareView {
                            person: profiles
                                .get(&share.person)
                                .cloned()
                                .unwrap_or_else(|| unknown_profile(share.person, expense.created_by)),
                            share,
                        })
                        .collect();
                    let user_share = share_views.iter().find(|s| s.share.person == me).cloned();
                    ExpenseView {
                        group_name: expense
                            .group_id
                            .and_then(|id| group_names.get(&id.to_string()).cloned()),
                        is_owner: expense.created_by == account_id,
                        creator,
                        shares: share_views,
                        user_share,
                        expense,
                    }
                })
                .collect();
            Ok(views)
        })
    }

    /// Marks a share as settled.
    ///
    /// Authorization: only the expense creator.
    pub async fn mark_share_paid(&self, session: &Session, share_id: Uuid) -> ResultEngine<()> {
        let result: ResultEngine<()> = with_tx!(self, |db_tx| {
            let model = expense_shares::Entity::find_by_id(share_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("share not exists".to_string()))?;
            let expense_id = parse_uuid(&model.expense_id, "expense")?;
            self.require_expense_owner(&db_tx, expense_id, session.account_id())
                .await?;

            let mut active: expense_shares::ActiveModel = model.into();
            active.paid = ActiveValue::Set(true);
            active.update(&db_tx).await?;
            Ok(())
        });
        result?;

        info!(share = %share_id, "share marked paid");
        self.publish(&[Table::ExpenseShares]);
        Ok(())
    }

    /// Deletes an expense and its shares.
    ///
    /// Authorization: only the expense creator.
    pub async fn delete_expense(&self, session: &Session, expense_id: Uuid) -> ResultEngine<()> {
        let result: ResultEngine<()> = with_tx!(self, |db_tx| {
            self.require_expense_owner(&db_tx, expense_id, session.account_id())
                .await?;
            expense_shares::Entity::delete_many()
                .filter(expense_shares::Column::ExpenseId.eq(expense_id.to_string()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        });
        result?;

        info!(expense = %expense_id, "expense deleted");
        self.publish(&[Table::ExpenseShares, Table::Expenses]);
        Ok(())
    }
}
