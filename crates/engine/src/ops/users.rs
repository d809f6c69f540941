use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Session, Table, User, users,
    util::{normalize_email, normalize_required_text},
};

use super::{Engine, with_tx};

impl Engine {
    /// Resolves the signed-in account into a [`Session`].
    ///
    /// Fails with `Unauthenticated` when nobody is signed in or when the
    /// signed-in account has no profile row yet.
    pub async fn current_session(&self) -> ResultEngine<Session> {
        let account_id = self
            .authenticator
            .current_user()
            .ok_or(EngineError::Unauthenticated)?;
        with_tx!(self, |db_tx| {
            let model = users::Entity::find_by_id(account_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or(EngineError::Unauthenticated)?;
            Ok(Session::new(account_id, model.email, model.full_name))
        })
    }

    pub fn sign_out(&self) {
        self.authenticator.sign_out();
    }

    /// Creates the profile row of a freshly signed-up account.
    ///
    /// Idempotent: an existing row for `account_id` is returned unchanged.
    /// Fails with `ExistingKey` if another account already uses `email`.
    pub async fn ensure_profile(
        &self,
        account_id: Uuid,
        email: &str,
        full_name: &str,
    ) -> ResultEngine<User> {
        let email = normalize_email(email)?;
        let full_name = normalize_required_text(full_name, "full name")?;

        let result: ResultEngine<(User, bool)> = with_tx!(self, |db_tx| {
            match users::Entity::find_by_id(account_id.to_string())
                .one(&db_tx)
                .await?
            {
                Some(model) => Ok((User::try_from(model)?, false)),
                None => {
                    if self.find_user_model_by_email(&db_tx, &email).await?.is_some() {
                        return Err(EngineError::ExistingKey(email));
                    }
                    let user = User {
                        id: account_id,
                        email: email.clone(),
                        full_name,
                        created_at: Utc::now(),
                    };
                    users::ActiveModel::from(&user).insert(&db_tx).await?;
                    Ok((user, true))
                }
            }
        });
        let (user, created) = result?;

        if created {
            info!(account = %user.id, "profile created");
            self.publish(&[Table::Users]);
        }
        Ok(user)
    }

    /// Looks up a registered user by email (trimmed, case-insensitive).
    pub async fn find_user_by_email(&self, session: &Session, email: &str) -> ResultEngine<User> {
        let email = normalize_email(email)?;
        debug!(account = %session.account_id(), "looking up user by email");
        with_tx!(self, |db_tx| {
            let model = self
                .find_user_model_by_email(&db_tx, &email)
                .await?
                .ok_or_else(|| EngineError::KeyNotFound("user not exists".to_string()))?;
            User::try_from(model)
        })
    }
}
