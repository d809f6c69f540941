mod common;

use std::collections::BTreeMap;

use sea_orm::{ConnectionTrait, Statement};

use common::{TestEngine, engine_with_db};
use engine::{
    EngineError, GroupMemberInput, MoneyCents, NewExpense, Person, PersonRef, Session,
};
use uuid::Uuid;

async fn alice_and_bob(t: &TestEngine) -> (Session, Session) {
    let bob = t.sign_up("bob@example.com", "Bob").await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    t.engine
        .add_friend(&alice, "bob@example.com")
        .await
        .unwrap();
    (alice, bob)
}

#[tokio::test]
async fn create_group_with_user_and_manual_friend_by_name() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;

    let created = t
        .engine
        .create_group(
            &alice,
            "Trip",
            vec![
                GroupMemberInput::Person(PersonRef::Registered(bob.account_id())),
                GroupMemberInput::ManualByName("Zoe".to_string()),
            ],
        )
        .await
        .unwrap();

    assert!(created.members.is_complete());
    assert_eq!(created.members.succeeded.len(), 2);
    assert_eq!(
        created.members.succeeded[0],
        Person::Registered {
            id: bob.account_id()
        }
    );
    let Person::Manual { id: zoe_id, owner_id } = created.members.succeeded[1] else {
        panic!("expected a manual friend");
    };
    assert_eq!(owner_id, alice.account_id());

    let members = t
        .engine
        .resolve_members(&alice, created.group_id)
        .await
        .unwrap();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].id(), alice.account_id());
    assert!(members.iter().any(|m| m.id() == zoe_id));

    // The manual friend joined the account's friend graph.
    let friends = t.engine.resolve_friend_graph(&alice).await.unwrap();
    assert!(friends.iter().any(|f| f.id() == zoe_id));
}

#[tokio::test]
async fn create_group_reuses_manual_friend_by_exact_name() {
    let t = engine_with_db().await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    let zoe = t.engine.add_manual_friend(&alice, "Zoe").await.unwrap();

    let created = t
        .engine
        .create_group(
            &alice,
            "Flat",
            vec![
                GroupMemberInput::ManualByName("Zoe".to_string()),
                GroupMemberInput::ManualByName("zoe".to_string()),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.members.succeeded[0].id(), zoe.id);
    assert_ne!(created.members.succeeded[1].id(), zoe.id);
    assert_eq!(t.count("manual_friends").await, 2);
}

#[tokio::test]
async fn create_group_reports_failed_members_and_keeps_the_rest() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;
    let ghost = PersonRef::Registered(Uuid::new_v4());

    let created = t
        .engine
        .create_group(
            &alice,
            "Trip",
            vec![
                GroupMemberInput::Person(ghost),
                GroupMemberInput::Person(PersonRef::Registered(alice.account_id())),
                GroupMemberInput::Person(PersonRef::Registered(bob.account_id())),
            ],
        )
        .await
        .unwrap();

    assert!(!created.members.is_complete());
    assert_eq!(created.members.succeeded.len(), 1);
    assert_eq!(created.members.failed.len(), 2);
    assert_eq!(
        created.members.failed[0].item,
        GroupMemberInput::Person(ghost)
    );

    let members = t
        .engine
        .resolve_members(&alice, created.group_id)
        .await
        .unwrap();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn create_group_rejects_other_accounts_manual_friend() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;
    let bobs_friend = t.engine.add_manual_friend(&bob, "Max").await.unwrap();

    let created = t
        .engine
        .create_group(
            &alice,
            "Trip",
            vec![GroupMemberInput::Person(PersonRef::Manual(bobs_friend.id))],
        )
        .await
        .unwrap();

    assert_eq!(created.members.failed.len(), 1);
    assert_eq!(
        created.members.failed[0].reason,
        EngineError::KeyNotFound("manual friend not exists".to_string()).to_string()
    );
}

#[tokio::test]
async fn create_group_requires_a_name() {
    let t = engine_with_db().await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    assert!(matches!(
        t.engine.create_group(&alice, "  ", Vec::new()).await,
        Err(EngineError::Validation(_))
    ));
    assert_eq!(t.count("groups").await, 0);
}

#[tokio::test]
async fn resolve_members_drops_dangling_rows() {
    let t = engine_with_db().await;
    let alice = t.sign_up("alice@example.com", "Alice").await;
    let created = t
        .engine
        .create_group(&alice, "Trip", Vec::new())
        .await
        .unwrap();

    let backend = t.db.get_database_backend();
    t.db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO group_members (id, group_id, registered_user_id, manual_friend_id, is_manual_friend) VALUES (?, ?, ?, NULL, ?)",
        vec![
            Uuid::new_v4().to_string().into(),
            created.group_id.to_string().into(),
            Uuid::new_v4().to_string().into(),
            false.into(),
        ],
    ))
    .await
    .unwrap();

    let members = t
        .engine
        .resolve_members(&alice, created.group_id)
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id(), alice.account_id());
}

#[tokio::test]
async fn list_groups_shows_membership_and_ownership() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;
    let carol = t.sign_up("carol@example.com", "Carol").await;

    let created = t
        .engine
        .create_group(
            &alice,
            "Trip",
            vec![GroupMemberInput::Person(PersonRef::Registered(
                bob.account_id(),
            ))],
        )
        .await
        .unwrap();

    let alice_groups = t.engine.list_groups(&alice).await.unwrap();
    assert_eq!(alice_groups.len(), 1);
    assert!(alice_groups[0].is_owner);
    assert_eq!(alice_groups[0].members.len(), 2);

    let bob_groups = t.engine.list_groups(&bob).await.unwrap();
    assert_eq!(bob_groups.len(), 1);
    assert_eq!(bob_groups[0].group.id, created.group_id);
    assert!(!bob_groups[0].is_owner);

    assert!(t.engine.list_groups(&carol).await.unwrap().is_empty());
    assert_eq!(
        t.engine
            .resolve_members(&carol, created.group_id)
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("group not exists".to_string())
    );
}

#[tokio::test]
async fn group_roster_changes_are_owner_only() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;
    t.sign_up("carol@example.com", "Carol").await;
    let created = t
        .engine
        .create_group(&alice, "Trip", Vec::new())
        .await
        .unwrap();
    let group_id = created.group_id;

    assert!(matches!(
        t.engine
            .add_group_member(&bob, group_id, "carol@example.com")
            .await,
        Err(EngineError::Forbidden(_))
    ));

    let bob_user = t
        .engine
        .add_group_member(&alice, group_id, "BOB@example.com")
        .await
        .unwrap();
    assert_eq!(bob_user.id, bob.account_id());
    assert_eq!(
        t.engine
            .add_group_member(&alice, group_id, "bob@example.com")
            .await
            .unwrap_err(),
        EngineError::ExistingKey("bob@example.com".to_string())
    );
    assert_eq!(
        t.engine
            .add_group_member(&alice, group_id, "nobody@example.com")
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("user not exists".to_string())
    );

    assert!(matches!(
        t.engine
            .remove_group_member(&alice, group_id, PersonRef::Registered(alice.account_id()))
            .await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        t.engine
            .remove_group_member(&bob, group_id, PersonRef::Registered(alice.account_id()))
            .await,
        Err(EngineError::Forbidden(_))
    ));

    t.engine
        .remove_group_member(&alice, group_id, PersonRef::Registered(bob.account_id()))
        .await
        .unwrap();
    assert_eq!(
        t.engine
            .remove_group_member(&alice, group_id, PersonRef::Registered(bob.account_id()))
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("member not exists".to_string())
    );
    assert_eq!(
        t.engine
            .resolve_members(&alice, group_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn delete_group_removes_its_expenses_for_everyone() {
    let t = engine_with_db().await;
    let (alice, bob) = alice_and_bob(&t).await;
    let created = t
        .engine
        .create_group(
            &alice,
            "Trip",
            vec![GroupMemberInput::Person(PersonRef::Registered(
                bob.account_id(),
            ))],
        )
        .await
        .unwrap();

    let mut shares = BTreeMap::new();
    shares.insert(PersonRef::Registered(alice.account_id()), MoneyCents::new(2000));
    shares.insert(PersonRef::Registered(bob.account_id()), MoneyCents::new(2000));
    t.engine
        .create_expense(
            &alice,
            NewExpense {
                title: "Hotel".to_string(),
                description: None,
                total: MoneyCents::new(4000),
                group_id: Some(created.group_id),
                shares: shares.clone(),
            },
        )
        .await
        .unwrap();
    t.engine
        .create_expense(
            &alice,
            NewExpense {
                title: "Groceries".to_string(),
                description: None,
                total: MoneyCents::new(4000),
                group_id: None,
                shares,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        t.engine.delete_group(&bob, created.group_id).await,
        Err(EngineError::Forbidden(_))
    ));

    t.engine.delete_group(&alice, created.group_id).await.unwrap();

    for session in [&alice, &bob] {
        let visible = t.engine.list_visible_expenses(session).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].expense.title, "Groceries");
        assert!(
            visible
                .iter()
                .all(|v| v.expense.group_id != Some(created.group_id))
        );
    }
    assert_eq!(t.count("groups").await, 0);
    assert_eq!(t.count("group_members").await, 0);
    assert_eq!(t.count("expense_shares").await, 2);
    assert_eq!(
        t.engine
            .delete_group(&alice, created.group_id)
            .await
            .unwrap_err(),
        EngineError::KeyNotFound("group not exists".to_string())
    );
}
