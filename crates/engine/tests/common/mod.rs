#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineOptions, Session, SessionStore};
use migration::MigratorTrait;
use uuid::Uuid;

pub struct TestEngine {
    pub engine: Arc<Engine>,
    pub auth: Arc<SessionStore>,
    pub db: DatabaseConnection,
}

impl TestEngine {
    /// Creates the profile, signs in and returns the session.
    pub async fn sign_up(&self, email: &str, full_name: &str) -> Session {
        let id = Uuid::new_v4();
        self.engine
            .ensure_profile(id, email, full_name)
            .await
            .unwrap();
        self.auth.sign_in(id);
        self.engine.current_session().await.unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        let backend = self.db.get_database_backend();
        let row = self
            .db
            .query_one(Statement::from_string(
                backend,
                format!("SELECT COUNT(*) AS n FROM \"{table}\""),
            ))
            .await
            .unwrap()
            .unwrap();
        row.try_get("", "n").unwrap()
    }
}

pub async fn engine_with_db() -> TestEngine {
    engine_with_options(EngineOptions::default()).await
}

pub async fn engine_with_options(options: EngineOptions) -> TestEngine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let auth = Arc::new(SessionStore::default());
    let engine = Engine::builder()
        .database(db.clone())
        .authenticator(auth.clone())
        .options(options)
        .build()
        .await
        .unwrap();
    TestEngine {
        engine: Arc::new(engine),
        auth,
        db,
    }
}
