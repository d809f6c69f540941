//! Shared-expense balance engine.
//!
//! People form friendships and groups, log expenses and split them among
//! registered users and manual friends. Balances between the account and
//! each friend are derived from those expenses on demand; nothing derived is
//! stored.

pub use allocation::{
    Allocation, Reconciliation, ReconciliationMode, SplitStrategy, allocate, check_reconciliation,
};
pub use auth::{Authenticator, Session, SessionStore};
pub use balances::{
    BalanceReport, BalanceSummary, FriendBalance, GroupBalance, fold_balances,
    fold_group_balances,
};
pub use changes::{ChangeFeed, ChangeSubscription, Table, TableChange};
pub use error::EngineError;
pub use expense_shares::ExpenseShare;
pub use expenses::{Expense, ExpenseView, ShareView};
pub use friendships::FriendshipStatus;
pub use groups::{Group, GroupCreated, GroupMemberInput, GroupView};
pub use manual_friends::ManualFriend;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder, EngineOptions, NewExpense};
pub use outcome::{BatchOutcome, FailedItem};
pub use person::{Person, PersonProfile, PersonRef};
pub use users::User;
pub use watcher::{BalanceWatcher, DebouncePolicy};

mod allocation;
mod auth;
mod balances;
mod changes;
mod error;
mod expense_shares;
mod expenses;
mod friendships;
mod group_members;
mod groups;
mod manual_friends;
mod money;
mod ops;
mod outcome;
mod person;
mod users;
mod util;
mod watcher;

type ResultEngine<T> = Result<T, EngineError>;
