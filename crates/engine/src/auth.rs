//! Session gate.
//!
//! The auth subsystem only answers "who is signed in". The engine turns that
//! answer into a [`Session`], which every operation takes as proof that the
//! caller is authenticated. A `Session` can only be built by
//! `Engine::current_session`.

use std::sync::{PoisonError, RwLock};

use serde::Serialize;
use uuid::Uuid;

/// Source of the currently authenticated account.
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    fn current_user(&self) -> Option<Uuid>;
    fn sign_out(&self);
}

/// In-process [`Authenticator`] holding at most one signed-in account.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: RwLock<Option<Uuid>>,
}

impl SessionStore {
    pub fn signed_in(account_id: Uuid) -> Self {
        Self {
            current: RwLock::new(Some(account_id)),
        }
    }

    pub fn sign_in(&self, account_id: Uuid) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(account_id);
    }
}

impl Authenticator for SessionStore {
    fn current_user(&self) -> Option<Uuid> {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn sign_out(&self) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// An authenticated account with its profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Session {
    account_id: Uuid,
    email: String,
    full_name: String,
}

impl Session {
    pub(crate) fn new(account_id: Uuid, email: String, full_name: String) -> Self {
        Self {
            account_id,
            email,
            full_name,
        }
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}
