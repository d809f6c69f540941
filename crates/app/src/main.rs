use std::sync::Arc;

use engine::{BalanceReport, BalanceWatcher, DebouncePolicy, Engine, EngineOptions, SessionStore};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "divvy={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let auth = Arc::new(SessionStore::default());
    let engine = Arc::new(
        Engine::builder()
            .database(db)
            .authenticator(auth.clone())
            .options(EngineOptions {
                reconciliation: settings.engine.reconciliation,
            })
            .build()
            .await?,
    );

    let Some(account_id) = settings.account else {
        tracing::warn!("no account configured, nothing to watch");
        return Ok(());
    };
    if let Some(profile) = &settings.profile {
        engine
            .ensure_profile(account_id, &profile.email, &profile.full_name)
            .await?;
    }
    auth.sign_in(account_id);
    let session = engine.current_session().await?;
    tracing::info!(account = %account_id, "watching balances for {}", session.full_name());

    let mut watcher = BalanceWatcher::spawn(
        engine.clone(),
        session,
        DebouncePolicy::from_millis(settings.engine.debounce_ms),
    );
    loop {
        tokio::select! {
            report = watcher.changed() => {
                let Some(report) = report else {
                    tracing::error!("balance watcher stopped");
                    break;
                };
                log_report(&report);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    engine.sign_out();
    Ok(())
}

fn log_report(report: &BalanceReport) {
    for friend in &report.per_friend {
        tracing::info!(
            friend = %friend.friend.display_name,
            balance = %friend.balance,
            "balance"
        );
    }
    tracing::info!(
        owed_to_me = %report.summary.total_owed_to_me,
        i_owe = %report.summary.total_i_owe,
        net = %report.summary.net,
        "summary"
    );
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
