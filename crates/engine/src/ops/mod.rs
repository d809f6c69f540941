use std::sync::Arc;

use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use crate::{
    Authenticator, ChangeFeed, ChangeSubscription, ReconciliationMode, ResultEngine, SessionStore,
    Table,
};

mod access;
mod balances;
mod expenses;
mod friends;
mod groups;
mod users;

pub use expenses::NewExpense;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Tunables that change engine behavior rather than storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// What `create_expense` does when shares do not add up to the total.
    #[serde(default)]
    pub reconciliation: ReconciliationMode,
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    authenticator: Arc<dyn Authenticator>,
    changes: ChangeFeed,
    options: EngineOptions,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Subscribe to committed changes, across all tables.
    pub fn subscribe(&self) -> ChangeSubscription {
        self.changes.subscribe()
    }

    fn publish(&self, tables: &[Table]) {
        self.changes.publish(tables);
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    authenticator: Option<Arc<dyn Authenticator>>,
    options: EngineOptions,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Pass the auth subsystem. Defaults to an empty [`SessionStore`].
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> EngineBuilder {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn options(mut self, options: EngineOptions) -> EngineBuilder {
        self.options = options;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            authenticator: self
                .authenticator
                .unwrap_or_else(|| Arc::new(SessionStore::default())),
            changes: ChangeFeed::default(),
            options: self.options,
        })
    }
}
