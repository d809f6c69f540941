mod common;

use std::time::Duration;

use common::engine_with_db;
use engine::{BalanceWatcher, DebouncePolicy, MoneyCents, NewExpense, PersonRef, Table};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn mutations_publish_table_changes() {
    let t = engine_with_db().await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    let mut changes = t.engine.subscribe().only([Table::ManualFriends]);

    t.engine.add_manual_friend(&alice, "Zoe").await.unwrap();

    let change = timeout(WAIT, changes.recv()).await.unwrap().unwrap();
    assert_eq!(change.table, Table::ManualFriends);
}

#[tokio::test]
async fn watcher_recomputes_after_changes_settle() {
    let t = engine_with_db().await;
    let bob = t.sign_up("bob@example.com", "Bob").await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    t.engine
        .add_friend(&alice, "bob@example.com")
        .await
        .unwrap();
    let bob_ref = PersonRef::Registered(bob.account_id());

    let mut watcher = BalanceWatcher::spawn(
        t.engine.clone(),
        alice.clone(),
        DebouncePolicy::from_millis(20),
    );
    let initial = timeout(WAIT, watcher.changed()).await.unwrap().unwrap();
    assert_eq!(initial.balance_of(bob_ref), Some(MoneyCents::ZERO));

    for amount in [1000, 2000] {
        t.engine
            .create_expense(
                &alice,
                NewExpense {
                    title: "Dinner".to_string(),
                    description: None,
                    total: MoneyCents::new(amount),
                    group_id: None,
                    shares: [(bob_ref, MoneyCents::new(amount))].into_iter().collect(),
                },
            )
            .await
            .unwrap();
    }

    // Wait until a report reflecting both expenses is published.
    let report = timeout(WAIT, async {
        loop {
            let report = watcher.changed().await.unwrap();
            if report.balance_of(bob_ref) == Some(MoneyCents::new(3000)) {
                break report;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(report.summary.net, MoneyCents::new(3000));
    assert_eq!(watcher.latest(), Some(report));
}
