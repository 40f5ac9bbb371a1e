use sea_orm::{Database, DatabaseConnection};

use engine::{CreateBillCmd, Engine, EngineError, Group, Money, ShareSpec, User};
use migration::MigratorTrait;
use uuid::Uuid;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn register(engine: &Engine, name: &str) -> User {
    engine
        .register_user(name, &format!("{}@example.com", name.to_lowercase()), "secret")
        .await
        .unwrap()
}

struct Trip {
    engine: Engine,
    alice: User,
    bob: User,
    carol: User,
    group: Group,
}

/// Alice, Bob and Carol in one group created by Alice.
async fn trip() -> Trip {
    let (engine, _db) = engine_with_db().await;
    let alice = register(&engine, "Alice").await;
    let bob = register(&engine, "Bob").await;
    let carol = register(&engine, "Carol").await;
    let group = engine
        .create_group("Trip", &[bob.id, carol.id], alice.id)
        .await
        .unwrap();
    Trip {
        engine,
        alice,
        bob,
        carol,
        group,
    }
}

fn eur(units: i64) -> Money {
    Money::new(units * 100)
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let (engine, _db) = engine_with_db().await;
    let alice = register(&engine, "Alice").await;
    assert_eq!(alice.email, "alice@example.com");

    let err = engine
        .register_user("Other Alice", "  ALICE@example.com ", "pw")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::DuplicateUser("alice@example.com".to_string())
    );

    let found = engine
        .find_user_by_email("Alice@Example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, alice.id);
}

#[tokio::test]
async fn create_group_includes_creator_once() {
    let (engine, _db) = engine_with_db().await;
    let alice = register(&engine, "Alice").await;
    let bob = register(&engine, "Bob").await;

    let group = engine
        .create_group("Flat", &[bob.id, bob.id, alice.id], alice.id)
        .await
        .unwrap();

    assert_eq!(group.members.len(), 2);
    assert!(group.has_member(alice.id));
    assert!(group.has_member(bob.id));
    assert_eq!(group.created_by, alice.id);
}

#[tokio::test]
async fn create_group_with_unknown_member_fails() {
    let (engine, _db) = engine_with_db().await;
    let alice = register(&engine, "Alice").await;
    let ghost = Uuid::new_v4();

    let err = engine
        .create_group("Flat", &[ghost], alice.id)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound(format!("user {ghost}")));
}

#[tokio::test]
async fn authorize_distinguishes_missing_group_from_outsider() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;

    let group = t
        .engine
        .authorize_group_access(t.group.id, t.bob.id)
        .await
        .unwrap();
    assert_eq!(group.id, t.group.id);

    let err = t
        .engine
        .authorize_group_access(t.group.id, dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = t
        .engine
        .authorize_group_access(Uuid::new_v4(), t.bob.id)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("group".to_string()));
}

#[tokio::test]
async fn add_member_grants_access() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;

    assert!(!t.engine.is_member(t.group.id, dave.id).await.unwrap());
    let group = t
        .engine
        .add_member(t.group.id, dave.id, t.carol.id)
        .await
        .unwrap();
    assert!(group.has_member(dave.id));
    assert!(t.engine.is_member(t.group.id, dave.id).await.unwrap());

    // Adding twice is harmless.
    let again = t
        .engine
        .add_member(t.group.id, dave.id, t.alice.id)
        .await
        .unwrap();
    assert_eq!(again.members, group.members);
}

#[tokio::test]
async fn add_member_requires_membership() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;
    let erin = register(&t.engine, "Erin").await;

    let err = t
        .engine
        .add_member(t.group.id, erin.id, dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn even_split_leaves_payer_a_portion() {
    let t = trip().await;

    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();

    assert_eq!(bill.payer_id, t.alice.id);
    assert_eq!(bill.share_of(t.bob.id), eur(30));
    assert_eq!(bill.share_of(t.carol.id), eur(30));
    assert_eq!(bill.share_of(t.alice.id), Money::ZERO);
    assert_eq!(bill.payer_portion, eur(30));
    assert_eq!(bill.shares.len(), 2);
}

#[tokio::test]
async fn fixed_share_and_even_remainder() {
    let t = trip().await;

    let cmd = CreateBillCmd::new(t.group.id, t.alice.id, "Groceries", eur(90))
        .fixed_share(t.bob.id, eur(50))
        .even_share(t.carol.id);
    let bill = t.engine.create_bill(cmd).await.unwrap();

    assert_eq!(bill.share_of(t.bob.id), eur(50));
    assert_eq!(bill.share_of(t.carol.id), eur(20));
    assert_eq!(bill.payer_portion, eur(20));
}

#[tokio::test]
async fn odd_cents_go_to_payer() {
    let t = trip().await;

    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(
            t.group.id,
            t.alice.id,
            "Taxi",
            Money::new(1000),
        ))
        .await
        .unwrap();

    assert_eq!(bill.share_of(t.bob.id), Money::new(333));
    assert_eq!(bill.share_of(t.carol.id), Money::new(333));
    assert_eq!(bill.payer_portion, Money::new(334));
    let allocated: Money = bill.shares.iter().map(|s| s.amount).sum();
    assert_eq!(allocated + bill.payer_portion, bill.total);
}

#[tokio::test]
async fn explicit_split_limits_participants() {
    let t = trip().await;

    let bill = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, t.alice.id, "Museum", eur(40))
                .shares(vec![ShareSpec::even(t.bob.id)]),
        )
        .await
        .unwrap();

    assert_eq!(bill.share_of(t.bob.id), eur(20));
    assert_eq!(bill.share_of(t.carol.id), Money::ZERO);
    assert_eq!(bill.shares.len(), 1);
}

#[tokio::test]
async fn empty_explicit_split_falls_back_to_group() {
    let t = trip().await;

    let bill = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)).shares(Vec::new()),
        )
        .await
        .unwrap();

    assert_eq!(bill.share_of(t.bob.id), eur(30));
    assert_eq!(bill.share_of(t.carol.id), eur(30));
}

#[tokio::test]
async fn outsider_cannot_create_bill() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;

    let err = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, dave.id, "Sneaky", eur(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    // Blank description and a split that cannot be allocated: the gate answers first.
    let err = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, dave.id, "  ", Money::ZERO)
                .fixed_share(t.bob.id, eur(5))
                .fixed_share(t.bob.id, eur(5)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    assert!(
        t.engine
            .list_bills(t.group.id, t.alice.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn bill_for_unknown_group_is_not_found() {
    let t = trip().await;

    let err = t
        .engine
        .create_bill(CreateBillCmd::new(
            Uuid::new_v4(),
            t.alice.id,
            "Lost",
            eur(10),
        ))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("group".to_string()));
}

#[tokio::test]
async fn payer_and_share_users_must_be_members() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;

    let err = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Fuel", eur(60)).payer(dave.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let err = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, t.alice.id, "Fuel", eur(60)).fixed_share(dave.id, eur(10)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    let ghost = Uuid::new_v4();
    let err = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, t.alice.id, "Fuel", eur(60)).even_share(ghost),
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound(format!("user {ghost}")));

    assert!(
        t.engine
            .list_bills(t.group.id, t.alice.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn rejects_bad_totals_and_descriptions() {
    let t = trip().await;

    let err = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Free", Money::ZERO))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "   ", eur(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidName(_)));
}

#[tokio::test]
async fn someone_else_can_be_the_payer() {
    let t = trip().await;

    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Hotel", eur(300)).payer(t.bob.id))
        .await
        .unwrap();

    assert_eq!(bill.payer_id, t.bob.id);
    assert_eq!(bill.created_by, t.alice.id);
    assert_eq!(bill.share_of(t.alice.id), eur(100));
    assert_eq!(bill.share_of(t.carol.id), eur(100));
    assert_eq!(bill.share_of(t.bob.id), Money::ZERO);
}

#[tokio::test]
async fn bills_are_visible_to_members_only() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;

    let first = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();
    let second = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.bob.id, "Lunch", eur(30)))
        .await
        .unwrap();

    let fetched = t.engine.bill(first.id, t.carol.id).await.unwrap();
    assert_eq!(fetched, first);

    let listed = t.engine.list_bills(t.group.id, t.carol.id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.contains(&first));
    assert!(listed.contains(&second));

    let err = t.engine.bill(first.id, dave.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = t.engine.bill(Uuid::new_v4(), t.alice.id).await.unwrap_err();
    assert_eq!(err, EngineError::NotFound("bill".to_string()));
}

#[tokio::test]
async fn settlements_reduce_amount_owed() {
    let t = trip().await;
    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();

    assert_eq!(t.engine.amount_owed(bill.id, t.bob.id).await.unwrap(), eur(30));

    t.engine
        .record_transaction(bill.id, eur(10), t.bob.id)
        .await
        .unwrap();
    assert_eq!(t.engine.amount_owed(bill.id, t.bob.id).await.unwrap(), eur(20));

    t.engine
        .record_transaction(bill.id, eur(20), t.bob.id)
        .await
        .unwrap();
    assert_eq!(
        t.engine.amount_owed(bill.id, t.bob.id).await.unwrap(),
        Money::ZERO
    );

    // Bob's payments do not touch Carol.
    assert_eq!(
        t.engine.amount_owed(bill.id, t.carol.id).await.unwrap(),
        eur(30)
    );
    // The payer holds no share.
    assert_eq!(
        t.engine.amount_owed(bill.id, t.alice.id).await.unwrap(),
        Money::ZERO
    );

    let txs = t
        .engine
        .list_transactions(bill.id, t.carol.id)
        .await
        .unwrap();
    assert_eq!(txs.len(), 2);
    assert!(txs.iter().all(|tx| tx.recorded_by == t.bob.id));
}

#[tokio::test]
async fn settlement_checks() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;
    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();

    let err = t
        .engine
        .record_transaction(bill.id, eur(10), dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let err = t
        .engine
        .record_transaction(Uuid::new_v4(), eur(10), t.bob.id)
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound("bill".to_string()));

    let err = t
        .engine
        .record_transaction(bill.id, Money::ZERO, t.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = t
        .engine
        .record_transaction(bill.id, Money::new(-500), t.bob.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    assert!(
        t.engine
            .list_transactions(bill.id, t.alice.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn net_balances_follow_bills_and_settlements() {
    let t = trip().await;

    assert_eq!(
        t.engine.net_balance(t.group.id, t.alice.id).await.unwrap(),
        Money::ZERO
    );

    let dinner = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();
    t.engine
        .create_bill(CreateBillCmd::new(t.group.id, t.bob.id, "Lunch", eur(30)))
        .await
        .unwrap();

    // Dinner: Bob and Carol owe Alice 30 each. Lunch: Alice and Carol owe Bob 10 each.
    assert_eq!(
        t.engine.net_balance(t.group.id, t.alice.id).await.unwrap(),
        eur(50)
    );
    assert_eq!(
        t.engine.net_balance(t.group.id, t.bob.id).await.unwrap(),
        eur(-10)
    );
    assert_eq!(
        t.engine.net_balance(t.group.id, t.carol.id).await.unwrap(),
        eur(-40)
    );

    t.engine
        .record_transaction(dinner.id, eur(30), t.carol.id)
        .await
        .unwrap();
    assert_eq!(
        t.engine.net_balance(t.group.id, t.carol.id).await.unwrap(),
        eur(-10)
    );
    assert_eq!(
        t.engine.net_balance(t.group.id, t.alice.id).await.unwrap(),
        eur(20)
    );

    let balances = t
        .engine
        .group_balances(t.group.id, t.bob.id)
        .await
        .unwrap();
    assert_eq!(balances.values().copied().sum::<Money>(), Money::ZERO);
}

#[tokio::test]
async fn settlement_by_member_without_share_shows_in_net_balance() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;
    t.engine
        .add_member(t.group.id, dave.id, t.alice.id)
        .await
        .unwrap();
    let museum = t
        .engine
        .create_bill(
            CreateBillCmd::new(t.group.id, t.alice.id, "Museum", eur(60))
                .shares(vec![ShareSpec::even(t.bob.id)]),
        )
        .await
        .unwrap();

    t.engine
        .record_transaction(museum.id, eur(10), dave.id)
        .await
        .unwrap();

    let owed = t.engine.amount_owed(museum.id, dave.id).await.unwrap();
    assert_eq!(owed, eur(-10));
    assert_eq!(
        t.engine.net_balance(t.group.id, dave.id).await.unwrap(),
        eur(10)
    );
    assert_eq!(
        t.engine.net_balance(t.group.id, t.alice.id).await.unwrap(),
        eur(20)
    );
    let balances = t
        .engine
        .group_balances(t.group.id, t.carol.id)
        .await
        .unwrap();
    assert_eq!(balances.values().copied().sum::<Money>(), Money::ZERO);
}

#[tokio::test]
async fn balances_require_membership() {
    let t = trip().await;
    let dave = register(&t.engine, "Dave").await;
    let bill = t
        .engine
        .create_bill(CreateBillCmd::new(t.group.id, t.alice.id, "Dinner", eur(90)))
        .await
        .unwrap();

    let err = t.engine.amount_owed(bill.id, dave.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
    let err = t
        .engine
        .net_balance(t.group.id, dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn balances_survive_a_file_backed_reconnect() {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("ledger_{}.db", Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    let (group_id, bob_id, bill_id) = {
        let db = Database::connect(&url).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        let alice = register(&engine, "Alice").await;
        let bob = register(&engine, "Bob").await;
        let group = engine
            .create_group("Flat", &[bob.id], alice.id)
            .await
            .unwrap();
        let bill = engine
            .create_bill(CreateBillCmd::new(group.id, alice.id, "Rent", eur(1000)))
            .await
            .unwrap();
        engine
            .record_transaction(bill.id, eur(200), bob.id)
            .await
            .unwrap();
        (group.id, bob.id, bill.id)
    };

    let db = Database::connect(&url).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    assert_eq!(engine.amount_owed(bill_id, bob_id).await.unwrap(), eur(300));
    assert_eq!(
        engine.net_balance(group_id, bob_id).await.unwrap(),
        eur(-300)
    );

    let _ = std::fs::remove_file(path);
}
