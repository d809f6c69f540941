use std::collections::BTreeSet;

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    EngineError, FriendBalance, FriendshipStatus, ManualFriend, PersonProfile, PersonRef,
    ResultEngine, Session, Table, User, friendships, manual_friends,
    util::{normalize_email, normalize_required_text},
};

use super::{Engine, with_tx};

/// Edges between `a` and `b`, in either direction.
fn pair(a: Uuid, b: Uuid) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(friendships::Column::UserId.eq(a.to_string()))
                .add(friendships::Column::FriendId.eq(b.to_string())),
        )
        .add(
            Condition::all()
                .add(friendships::Column::UserId.eq(b.to_string()))
                .add(friendships::Column::FriendId.eq(a.to_string())),
        )
}

impl Engine {
    /// Every person the account can split expenses with: registered users
    /// on the other side of an accepted friendship, then the account's
    /// manual friends.
    pub async fn resolve_friend_graph(&self, session: &Session) -> ResultEngine<Vec<PersonProfile>> {
        with_tx!(self, |db_tx| {
            self.friend_graph(&db_tx, session.account_id()).await
        })
    }

    pub(super) async fn friend_graph(
        &self,
        db: &DatabaseTransaction,
        account_id: Uuid,
    ) -> ResultEngine<Vec<PersonProfile>> {
        let me = account_id.to_string();
        let edges = friendships::Entity::find()
            .filter(friendships::Column::Status.eq(FriendshipStatus::Accepted.as_str()))
            .filter(
                Condition::any()
                    .add(friendships::Column::UserId.eq(me.clone()))
                    .add(friendships::Column::FriendId.eq(me.clone())),
            )
            .all(db)
            .await?;

        let mut friend_ids = BTreeSet::new();
        for edge in &edges {
            match edge.other_side(account_id) {
                Ok(id) if id != account_id => {
                    friend_ids.insert(id);
                }
                Ok(_) => {}
                Err(err) => warn!(friendship = %edge.id, %err, "skipping malformed friendship"),
            }
        }

        let mut profiles = self
            .resolve_profiles(db, friend_ids.iter().map(|&id| PersonRef::Registered(id)))
            .await?;
        let mut registered: Vec<PersonProfile> = friend_ids
            .into_iter()
            .filter_map(|id| {
                let profile = profiles.remove(&PersonRef::Registered(id));
                if profile.is_none() {
                    warn!(friend = %id, "friend has no profile, dropping");
                }
                profile
            })
            .collect();
        registered.sort_by_key(|p| p.display_name.to_lowercase());

        let manual_models = manual_friends::Entity::find()
            .filter(manual_friends::Column::UserId.eq(me))
            .order_by_asc(manual_friends::Column::Name)
            .all(db)
            .await?;
        let manual = manual_models.into_iter().filter_map(|model| {
            let id = model.id.clone();
            ManualFriend::try_from(model)
                .inspect_err(|err| warn!(manual_friend = %id, %err, "skipping malformed row"))
                .ok()
                .map(|friend| friend.profile())
        });

        registered.extend(manual);
        Ok(registered)
    }

    /// Befriends the registered user with `email`.
    ///
    /// The friendship is accepted immediately. A pending edge written by
    /// another client is accepted in place.
    pub async fn add_friend(&self, session: &Session, email: &str) -> ResultEngine<User> {
        let email = normalize_email(email)?;
        let account_id = session.account_id();

        let result: ResultEngine<User> = with_tx!(self, |db_tx| {
            let target = self
                .find_user_model_by_email(&db_tx, &email)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
            let target = User::try_from(target)?;
            if target.id == account_id {
                return Err(EngineError::Validation(
                    "cannot add yourself as a friend".to_string(),
                ));
            }

            let edges = friendships::Entity::find()
                .filter(pair(account_id, target.id))
                .all(&db_tx)
                .await?;
            if edges
                .iter()
                .any(|e| e.status == FriendshipStatus::Accepted.as_str())
            {
                return Err(EngineError::AlreadyFriends(email));
            }

            match edges.into_iter().next() {
                Some(pending) => {
                    let mut active: friendships::ActiveModel = pending.into();
                    active.status =
                        ActiveValue::Set(FriendshipStatus::Accepted.as_str().to_string());
                    active.update(&db_tx).await?;
                }
                None => {
                    friendships::accepted(account_id, target.id)
                        .insert(&db_tx)
                        .await?;
                }
            }
            Ok(target)
        });
        let friend = result?;

        info!(account = %account_id, friend = %friend.id, "friend added");
        self.publish(&[Table::Friendships]);
        Ok(friend)
    }

    /// Creates a manual friend owned by the account. Names are not unique.
    pub async fn add_manual_friend(
        &self,
        session: &Session,
        name: &str,
    ) -> ResultEngine<ManualFriend> {
        let name = normalize_required_text(name, "name")?;
        let friend = ManualFriend::new(session.account_id(), name);

        let result: ResultEngine<()> = with_tx!(self, |db_tx| {
            manual_friends::ActiveModel::from(&friend)
                .insert(&db_tx)
                .await?;
            Ok(())
        });
        result?;

        info!(account = %friend.owner_id, manual_friend = %friend.id, "manual friend added");
        self.publish(&[Table::ManualFriends]);
        Ok(friend)
    }

    /// The friend graph with each friend's balance.
    pub async fn list_friends(&self, session: &Session) -> ResultEngine<Vec<FriendBalance>> {
        Ok(self.compute_balances(session).await?.per_friend)
    }
}
