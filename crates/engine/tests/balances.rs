mod common;

use sea_orm::{ConnectionTrait, Statement};

use common::{TestEngine, engine_with_db};
use engine::{BalanceSummary, GroupMemberInput, MoneyCents, NewExpense, PersonRef, Session};
use uuid::Uuid;

fn expense(total: i64, shares: &[(PersonRef, i64)]) -> NewExpense {
    NewExpense {
        title: "Dinner".to_string(),
        description: None,
        total: MoneyCents::new(total),
        group_id: None,
        shares: shares
            .iter()
            .map(|(p, a)| (*p, MoneyCents::new(*a)))
            .collect(),
    }
}

async fn friends(t: &TestEngine) -> (Session, Session) {
    let bob = t.sign_up("bob@example.com", "Bob").await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    t.engine
        .add_friend(&alice, "bob@example.com")
        .await
        .unwrap();
    (alice, bob)
}

#[tokio::test]
async fn friend_without_shared_expenses_is_even() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.per_friend.len(), 1);
    assert_eq!(
        report.balance_of(PersonRef::Registered(bob.account_id())),
        Some(MoneyCents::ZERO)
    );
    assert_eq!(report.summary, BalanceSummary::default());
}

#[tokio::test]
async fn one_way_expense_is_owed_to_the_creator() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let me = PersonRef::Registered(alice.account_id());
    let bob_ref = PersonRef::Registered(bob.account_id());

    t.engine
        .create_expense(&alice, expense(6000, &[(me, 3000), (bob_ref, 3000)]))
        .await
        .unwrap();

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.balance_of(bob_ref), Some(MoneyCents::new(3000)));
    assert_eq!(report.summary.total_owed_to_me, MoneyCents::new(3000));
    assert_eq!(report.summary.total_i_owe, MoneyCents::ZERO);
    assert_eq!(report.summary.net, MoneyCents::new(3000));

    // Bob sees the mirror image.
    let report = t.engine.compute_balances(&bob).await.unwrap();
    assert_eq!(report.balance_of(me), Some(MoneyCents::new(-3000)));
    assert_eq!(report.summary.total_i_owe, MoneyCents::new(3000));
}

#[tokio::test]
async fn reverse_expense_nets_out() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let me = PersonRef::Registered(alice.account_id());
    let bob_ref = PersonRef::Registered(bob.account_id());

    t.engine
        .create_expense(&alice, expense(3000, &[(bob_ref, 3000)]))
        .await
        .unwrap();
    t.engine
        .create_expense(&bob, expense(1000, &[(me, 1000)]))
        .await
        .unwrap();

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.balance_of(bob_ref), Some(MoneyCents::new(2000)));
    let friend = &report.per_friend[0];
    assert_eq!(friend.owed_to_me, MoneyCents::new(3000));
    assert_eq!(friend.owed_by_me, MoneyCents::new(1000));
}

#[tokio::test]
async fn manual_friend_balance_only_counts_what_they_owe() {
    let t = engine_with_db().await;
    let (alice, _bob) = friends(&t).await;
    let zoe = t.engine.add_manual_friend(&alice, "Zoe").await.unwrap();
    let zoe_ref = PersonRef::Manual(zoe.id);

    t.engine
        .create_expense(&alice, expense(2500, &[(zoe_ref, 2500)]))
        .await
        .unwrap();

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.per_friend.len(), 2);
    let zoe_balance = report
        .per_friend
        .iter()
        .find(|f| f.friend.id() == zoe.id)
        .unwrap();
    assert_eq!(zoe_balance.owed_by_me, MoneyCents::ZERO);
    assert_eq!(zoe_balance.balance, MoneyCents::new(2500));
    assert_eq!(report.summary.total_owed_to_me, MoneyCents::new(2500));
}

#[tokio::test]
async fn malformed_share_does_not_break_the_report() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let bob_ref = PersonRef::Registered(bob.account_id());
    let dinner = t
        .engine
        .create_expense(&alice, expense(1000, &[(bob_ref, 1000)]))
        .await
        .unwrap();

    let backend = t.db.get_database_backend();
    t.db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO expense_shares (id, expense_id, registered_user_id, manual_friend_id, is_manual_friend, amount_minor, paid) VALUES (?, ?, ?, NULL, ?, ?, ?)",
        vec![
            Uuid::new_v4().to_string().into(),
            dinner.id.to_string().into(),
            "not-a-uuid".into(),
            false.into(),
            500_i64.into(),
            false.into(),
        ],
    ))
    .await
    .unwrap();

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.balance_of(bob_ref), Some(MoneyCents::new(1000)));

    let visible = t.engine.list_visible_expenses(&alice).await.unwrap();
    assert_eq!(visible[0].shares.len(), 1);
}

#[tokio::test]
async fn expenses_of_non_friends_are_not_balanced() {
    let t = engine_with_db().await;
    let (alice, _bob) = friends(&t).await;
    let carol = t.sign_up("carol@example.com", "Carol").await;

    t.engine
        .create_expense(
            &carol,
            expense(800, &[(PersonRef::Registered(alice.account_id()), 800)]),
        )
        .await
        .unwrap();

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.summary, BalanceSummary::default());
    // Still visible as an expense.
    assert_eq!(t.engine.list_visible_expenses(&alice).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_friends_carries_balances() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    t.engine
        .create_expense(
            &bob,
            expense(1200, &[(PersonRef::Registered(alice.account_id()), 1200)]),
        )
        .await
        .unwrap();

    let friends = t.engine.list_friends(&alice).await.unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].friend.display_name, "Bob");
    assert_eq!(friends[0].balance, MoneyCents::new(-1200));
}

#[tokio::test]
async fn group_balances_are_scoped_to_each_group() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let me = PersonRef::Registered(alice.account_id());
    let bob_ref = PersonRef::Registered(bob.account_id());
    let members = vec![GroupMemberInput::Person(bob_ref)];
    let trip = t
        .engine
        .create_group(&alice, "Trip", members.clone())
        .await
        .unwrap();
    let flat = t
        .engine
        .create_group(&alice, "Flat", members)
        .await
        .unwrap();

    let mut hotel = expense(9000, &[(me, 4500), (bob_ref, 4500)]);
    hotel.group_id = Some(trip.group_id);
    t.engine.create_expense(&alice, hotel).await.unwrap();

    let mut rent = expense(2000, &[(me, 1000), (bob_ref, 1000)]);
    rent.group_id = Some(flat.group_id);
    t.engine.create_expense(&bob, rent).await.unwrap();

    // Personal expenses do not count towards any group.
    t.engine
        .create_expense(&alice, expense(500, &[(bob_ref, 500)]))
        .await
        .unwrap();

    let balances = t.engine.group_balances(&alice).await.unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].group_name, "Flat");
    assert_eq!(balances[0].balance, MoneyCents::new(-1000));
    assert_eq!(balances[1].group_name, "Trip");
    assert_eq!(balances[1].balance, MoneyCents::new(4500));

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.balance_of(bob_ref), Some(MoneyCents::new(4000)));
}

#[tokio::test]
async fn balances_require_no_stored_state() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let bob_ref = PersonRef::Registered(bob.account_id());
    let dinner = t
        .engine
        .create_expense(&alice, expense(1000, &[(bob_ref, 1000)]))
        .await
        .unwrap();
    assert_eq!(
        t.engine
            .compute_balances(&alice)
            .await
            .unwrap()
            .balance_of(bob_ref),
        Some(MoneyCents::new(1000))
    );

    t.engine.delete_expense(&alice, dinner.id).await.unwrap();
    assert_eq!(
        t.engine
            .compute_balances(&alice)
            .await
            .unwrap()
            .balance_of(bob_ref),
        Some(MoneyCents::ZERO)
    );
}

#[tokio::test]
async fn huge_balances_do_not_abort_the_report() {
    let t = engine_with_db().await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    let max = t.engine.add_manual_friend(&alice, "Max").await.unwrap();
    let zoe = t.engine.add_manual_friend(&alice, "Zoe").await.unwrap();
    let half = i64::MAX / 2 + 10;

    for friend in [&max, &zoe] {
        t.engine
            .create_expense(&alice, expense(half, &[(PersonRef::Manual(friend.id), half)]))
            .await
            .unwrap();
    }

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.per_friend.len(), 2);
    assert_eq!(
        report.balance_of(PersonRef::Manual(max.id)),
        Some(MoneyCents::new(half))
    );
    assert_eq!(
        report.balance_of(PersonRef::Manual(zoe.id)),
        Some(MoneyCents::new(half))
    );
    // Max comes first by name; Zoe no longer fits in the totals.
    assert_eq!(report.summary.total_owed_to_me, MoneyCents::new(half));
    assert_eq!(report.summary.total_i_owe, MoneyCents::ZERO);
}

#[tokio::test]
async fn many_shared_expenses_are_all_counted() {
    let t = engine_with_db().await;
    let (alice, bob) = friends(&t).await;
    let alice_ref = PersonRef::Registered(alice.account_id());
    let bob_ref = PersonRef::Registered(bob.account_id());

    // More ids than fit in a single IN list batch.
    let count = 1_100;
    for _ in 0..count {
        t.engine
            .create_expense(&bob, expense(10, &[(alice_ref, 10)]))
            .await
            .unwrap();
    }

    let report = t.engine.compute_balances(&alice).await.unwrap();
    assert_eq!(report.balance_of(bob_ref), Some(MoneyCents::new(-10 * count)));

    let visible = t.engine.list_visible_expenses(&alice).await.unwrap();
    assert_eq!(visible.len(), count as usize);
    assert!(visible.iter().all(|v| v.user_share.is_some()));
}
