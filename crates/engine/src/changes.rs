//! Change notifications.
//!
//! Every committed mutation publishes one [`TableChange`] per table it
//! touched. Subscribers can narrow the stream to the tables they care about.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    ManualFriends,
    Friendships,
    Groups,
    GroupMembers,
    Expenses,
    ExpenseShares,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Users,
        Table::ManualFriends,
        Table::Friendships,
        Table::Groups,
        Table::GroupMembers,
        Table::Expenses,
        Table::ExpenseShares,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::ManualFriends => "manual_friends",
            Self::Friendships => "friendships",
            Self::Groups => "groups",
            Self::GroupMembers => "group_members",
            Self::Expenses => "expenses",
            Self::ExpenseShares => "expense_shares",
        }
    }

    /// Tables whose rows feed the balance fold.
    pub fn affects_balances(self) -> bool {
        matches!(
            self,
            Self::ManualFriends | Self::Friendships | Self::Expenses | Self::ExpenseShares
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: Table,
}

#[derive(Clone, Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<TableChange>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, tables: &[Table]) {
        for &table in tables {
            // No subscribers is fine.
            if self.sender.send(TableChange { table }).is_err() {
                debug!(table = table.as_str(), "change dropped, no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
            tables: None,
        }
    }
}

pub struct ChangeSubscription {
    receiver: broadcast::Receiver<TableChange>,
    tables: Option<HashSet<Table>>,
}

impl ChangeSubscription {
    /// Keeps only changes to `tables`.
    pub fn only(mut self, tables: impl IntoIterator<Item = Table>) -> Self {
        self.tables = Some(tables.into_iter().collect());
        self
    }

    fn wants(&self, table: Table) -> bool {
        self.tables.as_ref().is_none_or(|t| t.contains(&table))
    }

    /// Waits for the next matching change. `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<TableChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.wants(change.table) => return Some(change),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "change subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
