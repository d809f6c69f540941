use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
    TransactionTrait, prelude::*, sea_query::SelectStatement,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    BalanceReport, Expense, ExpenseShare, Group, GroupBalance, PersonRef, ResultEngine, Session,
    expense_shares, expenses, fold_balances, fold_group_balances, groups,
};

use super::{Engine, with_tx};

impl Engine {
    /// Balances between the account and every friend, plus the summary.
    ///
    /// Fetches the account's expenses and the friends' expenses that carry a
    /// share for the account once, then folds them in memory. Malformed rows
    /// are skipped and never fail the whole computation.
    pub async fn compute_balances(&self, session: &Session) -> ResultEngine<BalanceReport> {
        let account_id = session.account_id();
        with_tx!(self, |db_tx| {
            let friends = self.friend_graph(&db_tx, account_id).await?;
            let friend_ids: Vec<String> = friends
                .iter()
                .filter(|f| f.person.is_registered())
                .map(|f| f.id().to_string())
                .collect();

            let mut models = expenses::Entity::find()
                .filter(expenses::Column::CreatedBy.eq(account_id.to_string()))
                .all(&db_tx)
                .await?;
            if !friend_ids.is_empty() {
                let incoming = expenses::Entity::find()
                    .filter(expenses::Column::CreatedBy.is_in(friend_ids))
                    .filter(expenses::Column::Id.in_subquery(expenses_sharing_with(account_id)))
                    .all(&db_tx)
                    .await?;
                models.extend(incoming);
            }

            let expenses = self.expenses_with_shares(&db_tx, models).await?;
            debug!(
                account = %account_id,
                friends = friends.len(),
                expenses = expenses.len(),
                "folding balances"
            );
            Ok(fold_balances(account_id, friends, &expenses))
        })
    }

    /// One aggregate per group the account belongs to, ordered by name.
    pub async fn group_balances(&self, session: &Session) -> ResultEngine<Vec<GroupBalance>> {
        let account_id = session.account_id();
        with_tx!(self, |db_tx| {
            let ids = self.account_group_ids(&db_tx, account_id).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let groups: Vec<Group> = groups::Entity::find()
                .filter(groups::Column::Id.is_in(ids.clone()))
                .order_by_asc(groups::Column::Name)
                .all(&db_tx)
                .await?
                .into_iter()
                .filter_map(|model| {
                    Group::try_from(model)
                        .inspect_err(|err| warn!(%err, "skipping malformed group"))
                        .ok()
                })
                .collect();

            let models = expenses::Entity::find()
                .filter(expenses::Column::GroupId.is_in(ids))
                .filter(
                    Condition::any()
                        .add(expenses::Column::CreatedBy.eq(account_id.to_string()))
                        .add(expenses::Column::Id.in_subquery(expenses_sharing_with(account_id))),
                )
                .all(&db_tx)
                .await?;

            let expenses = self.expenses_with_shares(&db_tx, models).await?;
            Ok(fold_group_balances(account_id, &groups, &expenses))
        })
    }

    /// Decodes `models` and attaches their shares. Malformed expenses are
    /// skipped.
    async fn expenses_with_shares(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<(Expense, Vec<ExpenseShare>)>> {
        let expenses: Vec<Expense> = models
            .into_iter()
            .filter_map(|model| {
                let id = model.id.clone();
                Expense::try_from(model)
                    .inspect_err(|err| warn!(expense = %id, %err, "skipping malformed expense"))
                    .ok()
            })
            .collect();
        let mut shares = self
            .load_shares(db, expenses.iter().map(|e| e.id.to_string()).collect())
            .await?;
        Ok(expenses
            .into_iter()
            .map(|expense| {
                let attached = shares.remove(&expense.id).unwrap_or_default();
                (expense, attached)
            })
            .collect())
    }
}

/// Ids of the expenses holding a share for the account itself, as a subquery.
fn expenses_sharing_with(account_id: Uuid) -> SelectStatement {
    expense_shares::Entity::find()
        .select_only()
        .column(expense_shares::Column::ExpenseId)
        .filter(expense_shares::references(PersonRef::Registered(account_id)))
        .into_query()
}
