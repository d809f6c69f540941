use std::collections::{BTreeSet, HashMap, HashSet};

use sea_orm::{Condition, DatabaseTransaction, QueryFilter, QuerySelect, prelude::*};
use tracing::warn;
use uuid::Uuid;

use crate::{
    EngineError, ExpenseShare, ManualFriend, Person, PersonProfile, PersonRef, ResultEngine, User,
    expense_shares, expenses, group_members, groups, manual_friends, users, util::parse_uuid,
};

use super::Engine;

/// Upper bound on ids bound into one `IN (...)` list, below SQLite's
/// bound-parameter limit.
const MAX_BOUND_IDS: usize = 500;

/// Matches rows of a person-referencing table that point at any of `persons`.
pub(super) fn any_reference(
    persons: &[PersonRef],
    references: fn(PersonRef) -> Condition,
) -> Condition {
    persons
        .iter()
        .fold(Condition::any(), |cond, &person| cond.add(references(person)))
}

impl Engine {
    pub(super) async fn require_user(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<users::Model> {
        users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))
    }

    /// `email` must already be normalized.
    pub(super) async fn find_user_model_by_email(
        &self,
        db: &DatabaseTransaction,
        email: &str,
    ) -> ResultEngine<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(db)
            .await
            .map_err(Into::into)
    }

    pub(super) async fn require_owned_manual_friend(
        &self,
        db: &DatabaseTransaction,
        manual_friend_id: Uuid,
        owner_id: Uuid,
    ) -> ResultEngine<manual_friends::Model> {
        manual_friends::Entity::find_by_id(manual_friend_id.to_string())
            .filter(manual_friends::Column::UserId.eq(owner_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("manual friend not exists".to_string()))
    }

    /// Checks that `person` can appear in a share or roster created by
    /// `account_id`: registered users must exist, manual friends must be
    /// owned by the account.
    pub(super) async fn require_person_for(
        &self,
        db: &DatabaseTransaction,
        person: PersonRef,
        account_id: Uuid,
    ) -> ResultEngine<()> {
        match person {
            PersonRef::Registered(id) => self.require_user(db, id).await.map(|_| ()),
            PersonRef::Manual(id) => self
                .require_owned_manual_friend(db, id, account_id)
                .await
                .map(|_| ()),
        }
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    pub(super) async fn require_group_owner(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        let model = self.require_group(db, group_id).await?;
        if model.created_by != account_id.to_string() {
            return Err(EngineError::Forbidden(
                "only the group owner can change it".to_string(),
            ));
        }
        Ok(model)
    }

    /// Every person that stands for the account: the account itself and its
    /// manual friends.
    pub(super) async fn account_persons(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<Vec<PersonRef>> {
        let manual_ids: Vec<String> = manual_friends::Entity::find()
            .select_only()
            .column(manual_friends::Column::Id)
            .filter(manual_friends::Column::UserId.eq(account_id.to_string()))
            .into_tuple()
            .all(db)
            .await?;

        let mut persons = vec![PersonRef::Registered(account_id)];
        for id in manual_ids {
            match parse_uuid(&id, "manual friend") {
                Ok(id) => persons.push(PersonRef::Manual(id)),
                Err(err) => warn!(%err, "skipping manual friend row"),
            }
        }
        Ok(persons)
    }

    pub(super) async fn is_group_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        person: PersonRef,
    ) -> ResultEngine<bool> {
        let row = group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.to_string()))
            .filter(group_members::references(person))
            .one(db)
            .await?;
        Ok(row.is_some())
    }

    /// Ids of the groups the account created or belongs to, directly or
    /// through one of its manual friends.
    pub(super) async fn account_group_ids(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<Vec<String>> {
        let persons = self.account_persons(db, account_id).await?;
        let mut ids: Vec<String> = group_members::Entity::find()
            .select_only()
            .column(group_members::Column::GroupId)
            .filter(any_reference(&persons, group_members::references))
            .into_tuple()
            .all(db)
            .await?;
        let owned: Vec<String> = groups::Entity::find()
            .select_only()
            .column(groups::Column::Id)
            .filter(groups::Column::CreatedBy.eq(account_id.to_string()))
            .into_tuple()
            .all(db)
            .await?;
        ids.extend(owned);

        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));
        Ok(ids)
    }

    pub(super) async fn require_expense_owner(
        &self,
        db: &DatabaseTransaction,
        expense_id: Uuid,
        account_id: Uuid,
    ) -> ResultEngine<expenses::Model> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        if model.created_by != account_id.to_string() {
            return Err(EngineError::Forbidden(
                "only the expense creator can change it".to_string(),
            ));
        }
        Ok(model)
    }

    /// Loads and decodes the shares of `expense_ids`, grouped by expense, in
    /// batches of [`MAX_BOUND_IDS`]. Malformed rows are skipped.
    pub(super) async fn load_shares(
        &self,
        db: &DatabaseTransaction,
        expense_ids: Vec<String>,
    ) -> ResultEngine<HashMap<Uuid, Vec<ExpenseShare>>> {
        let mut by_expense: HashMap<Uuid, Vec<ExpenseShare>> = HashMap::new();
        for chunk in expense_ids.chunks(MAX_BOUND_IDS) {
            let models = expense_shares::Entity::find()
                .filter(expense_shares::Column::ExpenseId.is_in(chunk.iter().cloned()))
                .all(db)
                .await?;
            for model in models {
                let share_id = model.id.clone();
                match ExpenseShare::try_from(model) {
                    Ok(share) => by_expense.entry(share.expense_id).or_default().push(share),
                    Err(err) => warn!(share = %share_id, %err, "skipping malformed share"),
                }
            }
        }
        Ok(by_expense)
    }

    /// Resolves `persons` to display-ready profiles in two batched queries.
    /// Persons without a backing row are left out of the map.
    pub(super) async fn resolve_profiles(
        &self,
        db: &DatabaseTransaction,
        persons: impl IntoIterator<Item = PersonRef>,
    ) -> ResultEngine<HashMap<PersonRef, PersonProfile>> {
        let mut registered = BTreeSet::new();
        let mut manual = BTreeSet::new();
        for person in persons {
            match person {
                PersonRef::Registered(id) => registered.insert(id.to_string()),
                PersonRef::Manual(id) => manual.insert(id.to_string()),
            };
        }

        let mut profiles = HashMap::new();
        let registered: Vec<String> = registered.into_iter().collect();
        for chunk in registered.chunks(MAX_BOUND_IDS) {
            let models = users::Entity::find()
                .filter(users::Column::Id.is_in(chunk.iter().cloned()))
                .all(db)
                .await?;
            for model in models {
                match User::try_from(model) {
                    Ok(user) => {
                        profiles.insert(PersonRef::Registered(user.id), user.profile());
                    }
                    Err(err) => warn!(%err, "skipping malformed user row"),
                }
            }
        }
        let manual: Vec<String> = manual.into_iter().collect();
        for chunk in manual.chunks(MAX_BOUND_IDS) {
            let models = manual_friends::Entity::find()
                .filter(manual_friends::Column::Id.is_in(chunk.iter().cloned()))
                .all(db)
                .await?;
            for model in models {
                match ManualFriend::try_from(model) {
                    Ok(friend) => {
                        profiles.insert(PersonRef::Manual(friend.id), friend.profile());
                    }
                    Err(err) => warn!(%err, "skipping malformed manual friend row"),
                }
            }
        }
        Ok(profiles)
    }
}

/// A stand-in for a person whose row is gone. Manual friends in a share
/// always belong to the expense creator.
pub(super) fn unknown_profile(person: PersonRef, creator_id: Uuid) -> PersonProfile {
    let person = match person {
        PersonRef::Registered(id) => Person::Registered { id },
        PersonRef::Manual(id) => Person::Manual {
            id,
            owner_id: creator_id,
        },
    };
    PersonProfile {
        person,
        display_name: "Unknown".to_string(),
        email: None,
    }
}
