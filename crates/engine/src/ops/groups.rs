use std::collections::HashMap;

use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, QueryTrait, TransactionTrait,
    prelude::*,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    BatchOutcome, EngineError, Group, GroupCreated, GroupMemberInput, GroupView, ManualFriend,
    Person, PersonProfile, PersonRef, ResultEngine, Session, Table, User, expense_shares,
    expenses, group_members, groups, manual_friends,
    util::{normalize_email, normalize_required_text},
};

use super::{Engine, with_tx};

/// Owner first, then everyone else by name.
fn sort_roster(members: &mut [PersonProfile], owner_id: Uuid) {
    members.sort_by_key(|p| {
        (
            p.person.to_ref() != PersonRef::Registered(owner_id),
            p.display_name.to_lowercase(),
        )
    });
}

impl Engine {
    /// Creates a group owned by the account and attaches `members`.
    ///
    /// The group and the owner's membership are written atomically. Each
    /// other member is attached on a best-effort basis: a member that cannot
    /// be attached is reported in `GroupCreated::members.failed` and the
    /// remaining members are still processed.
    ///
    /// `ManualByName` reuses the owner's manual friend with exactly that name
    /// (case-sensitive) or creates one. Two concurrent calls with the same
    /// new name may both create a manual friend.
    pub async fn create_group(
        &self,
        session: &Session,
        name: &str,
        members: Vec<GroupMemberInput>,
    ) -> ResultEngine<GroupCreated> {
        let name = normalize_required_text(name, "group name")?;
        let owner_id = session.account_id();
        let group = Group::new(name, owner_id);

        let result: ResultEngine<BatchOutcome<Person, GroupMemberInput>> =
            with_tx!(self, |db_tx| {
                groups::ActiveModel::from(&group).insert(&db_tx).await?;
                group_members::membership(group.id, PersonRef::Registered(owner_id))
                    .insert(&db_tx)
                    .await?;

                let mut outcome = BatchOutcome::default();
                for input in members {
                    // Savepoint: a failed member must not poison the group insert.
                    let savepoint = db_tx.begin().await?;
                    match self
                        .attach_member(&savepoint, group.id, owner_id, &input)
                        .await
                    {
                        Ok(person) => {
                            savepoint.commit().await?;
                            outcome.push_ok(person);
                        }
                        Err(err) => {
                            savepoint.rollback().await?;
                            warn!(group = %group.id, ?input, %err, "member not attached");
                            outcome.push_err(input, &err);
                        }
                    }
                }
                Ok(outcome)
            });
        let members = result?;

        info!(
            group = %group.id,
            attached = members.succeeded.len(),
            failed = members.failed.len(),
            "group created"
        );
        self.publish(&[Table::Groups, Table::GroupMembers, Table::ManualFriends]);
        Ok(GroupCreated {
            group_id: group.id,
            members,
        })
    }

    async fn attach_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        owner_id: Uuid,
        input: &GroupMemberInput,
    ) -> ResultEngine<Person> {
        let person = match input {
            GroupMemberInput::Person(PersonRef::Registered(id)) => {
                self.require_user(db, *id).await?;
                Person::Registered { id: *id }
            }
            GroupMemberInput::Person(PersonRef::Manual(id)) => {
                self.require_owned_manual_friend(db, *id, owner_id).await?;
                Person::Manual { id: *id, owner_id }
            }
            GroupMemberInput::ManualByName(name) => {
                let name = normalize_required_text(name, "manual friend name")?;
                let existing = manual_friends::Entity::find()
                    .filter(manual_friends::Column::UserId.eq(owner_id.to_string()))
                    .filter(manual_friends::Column::Name.eq(name.clone()))
                    .order_by_asc(manual_friends::Column::CreatedAt)
                    .one(db)
                    .await?;
                let friend = match existing {
                    Some(model) => ManualFriend::try_from(model)?,
                    None => {
                        let friend = ManualFriend::new(owner_id, name);
                        manual_friends::ActiveModel::from(&friend)
                            .insert(db)
                            .await?;
                        friend
                    }
                };
                friend.person()
            }
        };

        if self.is_group_member(db, group_id, person.to_ref()).await? {
            return Err(EngineError::ExistingKey("group member".to_string()));
        }
        group_members::membership(group_id, person.to_ref())
            .insert(db)
            .await?;
        Ok(person)
    }

    /// Rosters of `group_ids`, keyed by group id. Members whose identity no
    /// longer resolves are dropped.
    async fn group_rosters(
        &self,
        db: &DatabaseTransaction,
        group_ids: Vec<String>,
    ) -> ResultEngine<HashMap<Uuid, Vec<PersonProfile>>> {
        let models = group_members::Entity::find()
            .filter(group_members::Column::GroupId.is_in(group_ids))
            .all(db)
            .await?;

        let mut rows = Vec::with_capacity(models.len());
        for model in &models {
            match (model.group_uuid(), model.person()) {
                (Ok(group_id), Ok(person)) => rows.push((group_id, person)),
                (Err(err), _) | (_, Err(err)) => {
                    warn!(member = %model.id, %err, "skipping malformed group member");
                }
            }
        }

        let profiles = self
            .resolve_profiles(db, rows.iter().map(|(_, person)| *person))
            .await?;
        let mut rosters: HashMap<Uuid, Vec<PersonProfile>> = HashMap::new();
        for (group_id, person) in rows {
            match profiles.get(&person) {
                Some(profile) => rosters.entry(group_id).or_default().push(profile.clone()),
                None => warn!(group = %group_id, person = %person.id(), "member not resolved"),
            }
        }
        Ok(rosters)
    }

    /// The resolved roster of a group the account belongs to.
    pub async fn resolve_members(
        &self,
        session: &Session,
        group_id: Uuid,
    ) -> ResultEngine<Vec<PersonProfile>> {
        with_tx!(self, |db_tx| {
            let visible = self
                .account_group_ids(&db_tx, session.account_id())
                .await?
                .contains(&group_id.to_string());
            if !visible {
                return Err(EngineError::KeyNotFound("group not exists".to_string()));
            }
            let group = Group::try_from(self.require_group(&db_tx, group_id).await?)?;

            let mut members = self
                .group_rosters(&db_tx, vec![group_id.to_string()])
                .await?
                .remove(&group_id)
                .unwrap_or_default();
            sort_roster(&mut members, group.owner_id);
            Ok(members)
        })
    }

    /// Every group the account created or belongs to, newest first.
    pub async fn list_groups(&self, session: &Session) -> ResultEngine<Vec<GroupView>> {
        let account_id = session.account_id();
        with_tx!(self, |db_tx| {
            let ids = self.account_group_ids(&db_tx, account_id).await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let models = groups::Entity::find()
                .filter(groups::Column::Id.is_in(ids.clone()))
                .order_by_desc(groups::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            let mut rosters = self.group_rosters(&db_tx, ids).await?;

            let mut views = Vec::with_capacity(models.len());
            for model in models {
                let group = match Group::try_from(model) {
                    Ok(group) => group,
                    Err(err) => {
                        warn!(%err, "skipping malformed group");
                        continue;
                    }
                };
                let mut members = rosters.remove(&group.id).unwrap_or_default();
                sort_roster(&mut members, group.owner_id);
                views.push(GroupView {
                    is_owner: group.owner_id == account_id,
                    group,
                    members,
                });
            }
            Ok(views)
        })
    }

    /// Deletes a group with its expenses, their shares and its roster.
    ///
    /// Authorization: owner only.
    pub async fn delete_group(&self, session: &Session, group_id: Uuid) -> ResultEngine<()> {
        let result: ResultEngine<u64> = with_tx!(self, |db_tx| {
            self.require_group_owner(&db_tx, group_id, session.account_id())
                .await?;

            let group_expenses = expenses::Entity::find()
                .select_only()
                .column(expenses::Column::Id)
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .into_query();
            expense_shares::Entity::delete_many()
                .filter(expense_shares::Column::ExpenseId.in_subquery(group_expenses))
                .exec(&db_tx)
                .await?;
            let deleted_expenses = expenses::Entity::delete_many()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .exec(&db_tx)
                .await?
                .rows_affected;

            group_members::Entity::delete_many()
                .filter(group_members::Column::GroupId.eq(group_id.to_string()))
                .exec(&db_tx)
                .await?;
            groups::Entity::delete_by_id(group_id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(deleted_expenses)
        });
        let deleted_expenses = result?;

        info!(group = %group_id, deleted_expenses, "group deleted");
        self.publish(&[
            Table::ExpenseShares,
            Table::Expenses,
            Table::GroupMembers,
            Table::Groups,
        ]);
        Ok(())
    }

    /// Adds the registered user with `email` to a group.
    ///
    /// Authorization: owner only.
    pub async fn add_group_member(
        &self,
        session: &Session,
        group_id: Uuid,
        email: &str,
    ) -> ResultEngine<User> {
        let email = normalize_email(email)?;
        let result: ResultEngine<User> = with_tx!(self, |db_tx| {
            self.require_group_owner(&db_tx, group_id, session.account_id())
                .await?;
            let user = self
                .find_user_model_by_email(&db_tx, &email)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
            let user = User::try_from(user)?;

            let person = PersonRef::Registered(user.id);
            if self.is_group_member(&db_tx, group_id, person).await? {
                return Err(EngineError::ExistingKey(email));
            }
            group_members::membership(group_id, person)
                .insert(&db_tx)
                .await?;
            Ok(user)
        });
        let user = result?;

        info!(group = %group_id, member = %user.id, "group member added");
        self.publish(&[Table::GroupMembers]);
        Ok(user)
    }

    /// Removes `person` from a group. The owner cannot be removed.
    ///
    /// Authorization: owner only.
    pub async fn remove_group_member(
        &self,
        session: &Session,
        group_id: Uuid,
        person: PersonRef,
    ) -> ResultEngine<()> {
        let account_id = session.account_id();
        let result: ResultEngine<()> = with_tx!(self, |db_tx| {
            self.require_group_owner(&db_tx, group_id, account_id)
                .await?;
            if person == PersonRef::Registered(account_id) {
                return Err(EngineError::Validation(
                    "the group owner cannot be removed".to_string(),
                ));
            }
            let deleted = group_members::Entity::delete_many()
                .filter(group_members::Column::GroupId.eq(group_id.to_string()))
                .filter(group_members::references(person))
                .exec(&db_tx)
                .await?;
            if deleted.rows_affected == 0 {
                return Err(EngineError::KeyNotFound("member not exists".to_string()));
            }
            Ok(())
        });
        result?;

        info!(group = %group_id, member = %person.id(), "group member removed");
        self.publish(&[Table::GroupMembers]);
        Ok(())
    }
}
