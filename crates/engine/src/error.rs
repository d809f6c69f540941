//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Unauthenticated`] returned when no account is signed in.
//! - [`KeyNotFound`] returned when a referenced user, person, group, expense
//!   or share does not exist (or is not visible to the caller).
//! - [`AlreadyFriends`] returned by `add_friend` for an existing friendship.
//! - [`Forbidden`] returned when a non-owner tries to mutate a group or an
//!   expense.
//!
//!  [`Unauthenticated`]: EngineError::Unauthenticated
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`AlreadyFriends`]: EngineError::AlreadyFriends
//!  [`Forbidden`]: EngineError::Forbidden
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Already friends with {0}")]
    AlreadyFriends(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid split: {0}")]
    InvalidSplit(String),
    #[error("Shares do not add up: {0}")]
    ShareMismatch(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Invalid person reference: {0}")]
    InvalidPerson(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unauthenticated, Self::Unauthenticated) => true,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::AlreadyFriends(a), Self::AlreadyFriends(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidSplit(a), Self::InvalidSplit(b)) => a == b,
            (Self::ShareMismatch(a), Self::ShareMismatch(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::InvalidPerson(a), Self::InvalidPerson(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
