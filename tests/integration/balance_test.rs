//! Integration tests for balances and the ledger.

mod helpers;

use claimgate_core::error::ErrorKind;
use claimgate_core::types::RequesterId;
use claimgate_entity::ledger::EntryKind;

#[tokio::test]
async fn test_earn_and_spend() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    let (balance, entry) = engine
        .balances
        .earn(&requester, 100, None)
        .await
        .expect("Earn failed");
    assert_eq!(balance.amount, 100);
    assert_eq!(entry.kind, EntryKind::Earned);
    assert_eq!(entry.amount, 100);
    assert_eq!(entry.balance_after, 100);

    let (balance, entry) = engine
        .balances
        .spend(&requester, 30, Some("order-7".into()))
        .await
        .expect("Spend failed");
    assert_eq!(balance.amount, 70);
    assert_eq!(entry.kind, EntryKind::Used);
    assert_eq!(entry.amount, -30);
    assert_eq!(entry.balance_after, 70);
    assert_eq!(entry.order_ref.as_deref(), Some("order-7"));

    let history = engine
        .balances
        .history(&requester, 10)
        .await
        .expect("History failed");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, EntryKind::Used, "Newest entry first");
}

#[tokio::test]
async fn test_spend_requires_coverage() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    engine
        .balances
        .earn(&requester, 20, None)
        .await
        .expect("Earn failed");
    let err = engine
        .balances
        .spend(&requester, 21, None)
        .await
        .expect_err("Overdraft must be rejected");
    assert_eq!(err.kind, ErrorKind::InsufficientBalance);

    // The failed spend must leave no trace.
    let balance = engine.balances.current(&requester).await.unwrap();
    assert_eq!(balance.amount, 20);
    let history = engine.balances.history(&requester, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_amounts_must_be_positive() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    let err = engine
        .balances
        .earn(&requester, 0, None)
        .await
        .expect_err("Zero earn must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = engine
        .balances
        .earn(&requester, -5, None)
        .await
        .expect_err("Negative earn must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = engine
        .balances
        .spend(&requester, 0, None)
        .await
        .expect_err("Zero spend must be rejected");
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_reverse_spend_exactly_once() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    engine
        .balances
        .earn(&requester, 100, None)
        .await
        .expect("Earn failed");
    let (_, spend) = engine
        .balances
        .spend(&requester, 40, Some("order-3".into()))
        .await
        .expect("Spend failed");

    let (reversal, balance) = engine
        .balances
        .reverse(&requester, &spend.id)
        .await
        .expect("Reverse failed");
    assert_eq!(balance.amount, 100);
    assert_eq!(reversal.kind, EntryKind::Cancelled);
    assert_eq!(reversal.amount, 40);
    assert_eq!(reversal.reversal_of, Some(spend.id));
    assert_eq!(reversal.order_ref.as_deref(), Some("order-3"));

    let err = engine
        .balances
        .reverse(&requester, &spend.id)
        .await
        .expect_err("Second reverse must fail");
    assert_eq!(err.kind, ErrorKind::AlreadyCancelled);
    assert_eq!(engine.balances.current(&requester).await.unwrap().amount, 100);

    // The reversal entry itself is final.
    let err = engine
        .balances
        .reverse(&requester, &reversal.id)
        .await
        .expect_err("Reversing a reversal must fail");
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_reverse_earn_respects_coverage() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    let (_, earn) = engine
        .balances
        .earn(&requester, 100, None)
        .await
        .expect("Earn failed");
    engine
        .balances
        .spend(&requester, 80, None)
        .await
        .expect("Spend failed");

    // Undoing the earn would leave 20 - 100 below zero.
    let err = engine
        .balances
        .reverse(&requester, &earn.id)
        .await
        .expect_err("Reverse below zero must be rejected");
    assert_eq!(err.kind, ErrorKind::InsufficientBalance);
    assert_eq!(engine.balances.current(&requester).await.unwrap().amount, 20);
}

#[tokio::test]
async fn test_reverse_is_scoped_to_the_owner() {
    let engine = helpers::TestEngine::new().await;
    let owner = RequesterId::new();
    let stranger = RequesterId::new();

    let (_, entry) = engine
        .balances
        .earn(&owner, 50, None)
        .await
        .expect("Earn failed");
    let err = engine
        .balances
        .reverse(&stranger, &entry.id)
        .await
        .expect_err("Stranger must not reverse the entry");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_spends_serialize() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();
    engine
        .balances
        .earn(&requester, 100, None)
        .await
        .expect("Earn failed");

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let balances = engine.balances.clone();
        tasks.push(tokio::spawn(async move {
            balances.spend(&requester, 10, None).await
        }));
    }
    for outcome in futures::future::join_all(tasks).await {
        outcome
            .expect("Task panicked")
            .expect("Covered spend must succeed");
    }

    assert_eq!(engine.balances.current(&requester).await.unwrap().amount, 0);
    let err = engine
        .balances
        .spend(&requester, 1, None)
        .await
        .expect_err("Drained balance must reject further spends");
    assert_eq!(err.kind, ErrorKind::InsufficientBalance);
}

#[tokio::test]
async fn test_first_sight_creates_zero_balance() {
    let engine = helpers::TestEngine::new().await;
    let requester = RequesterId::new();

    let balance = engine
        .balances
        .current(&requester)
        .await
        .expect("Current failed");
    assert_eq!(balance.amount, 0);
    assert_eq!(balance.version, 1);
    assert!(engine
        .balances
        .history(&requester, 10)
        .await
        .unwrap()
        .is_empty());
}
