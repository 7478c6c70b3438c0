//! Integration tests for queue-decoupled issuance and the fulfillment
//! worker.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use claimgate_core::config::worker::WorkerConfig;
use claimgate_core::error::ErrorKind;
use claimgate_core::traits::broker::IntentBroker;
use claimgate_core::traits::counter::QuantityCounter;
use claimgate_core::types::RequesterId;
use claimgate_entity::claim::ClaimStatus;
use claimgate_worker::FulfillmentRunner;

#[tokio::test]
async fn test_queued_claim_becomes_issued() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");
    assert_eq!(ticket.status, ClaimStatus::Pending);

    // Before fulfillment the claim is visible, but only as pending.
    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.code, ticket.code);

    assert_eq!(engine.fulfill_queued().await, 1);

    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Issued);
    assert_eq!(claim.code, ticket.code, "Code must survive fulfillment");

    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 3);
}

#[tokio::test]
async fn test_redelivered_intent_lands_once() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    let partition = engine.broker.partition_for(resource.id.into_uuid());
    let delivery = engine
        .broker
        .consume(partition, Duration::from_millis(20))
        .await
        .expect("Consume failed")
        .expect("Intent must be queued");

    // Deliver the same payload twice, as an at-least-once broker may.
    engine
        .handler
        .fulfill(&delivery.payload)
        .await
        .expect("First delivery failed");
    engine
        .handler
        .fulfill(&delivery.payload)
        .await
        .expect("Redelivery must be absorbed");
    engine.broker.ack(&delivery).await.expect("Ack failed");

    // One decrement, one claim.
    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 4);
    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Issued);
}

#[tokio::test]
async fn test_pending_claim_rejects_use_and_cancel() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    let err = engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-1")
        .await
        .expect_err("Pending claim must not be usable");
    assert_eq!(err.kind, ErrorKind::Conflict);

    let err = engine
        .claims
        .cancel_claim(&ticket.claim_id, &requester)
        .await
        .expect_err("Pending claim must not be cancellable");
    assert_eq!(err.kind, ErrorKind::Conflict);

    // Once fulfilled, the same calls work.
    assert_eq!(engine.fulfill_queued().await, 1);
    engine
        .claims
        .use_claim(&ticket.claim_id, &requester, "order-1")
        .await
        .expect("Use after fulfillment failed");
}

#[tokio::test]
async fn test_poison_payload_is_dead_lettered() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    // Poison lands on the resource's partition, ahead of any real intent.
    engine
        .broker
        .publish(resource.id.into_uuid(), "not an intent")
        .await
        .expect("Publish failed");
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    assert_eq!(engine.fulfill_queued().await, 1);
    assert_eq!(engine.broker.dead_letter_len().await.unwrap(), 1);

    // The partition keeps draining past the poison.
    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Issued);
}

#[tokio::test]
async fn test_overadmitted_intent_is_dead_lettered() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(1).await;
    let requester = RequesterId::new();

    engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");
    assert_eq!(engine.fulfill_queued().await, 1);

    // Drift the counter so admission lets one more intent through than
    // the durable row can cover.
    engine
        .counter
        .force_set(&resource.id, 1)
        .await
        .expect("Force set failed");
    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Drifted counter must admit");

    // The durable write refuses it, and the intent is poison from then on.
    assert_eq!(engine.fulfill_queued().await, 0);
    assert_eq!(engine.broker.dead_letter_len().await.unwrap(), 1);
    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 0, "Oversell must not reach the row");

    // The marker is cleared, so the requester sees the claim as gone
    // rather than pending forever.
    let err = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect_err("Dead-lettered claim must not linger");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_recover_requeues_in_flight_intents() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(3).await;
    let requester = RequesterId::new();

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 1)
        .await
        .expect("Issue failed");

    // Consume without settling, as a consumer that died mid-flight.
    let partition = engine.broker.partition_for(resource.id.into_uuid());
    engine
        .broker
        .consume(partition, Duration::from_millis(20))
        .await
        .expect("Consume failed")
        .expect("Intent must be queued");

    assert_eq!(engine.broker.recover().await.unwrap(), 1);
    assert_eq!(engine.fulfill_queued().await, 1);
    let claim = engine
        .claims
        .get_status(&ticket.claim_id, &requester)
        .await
        .expect("Status lookup failed");
    assert_eq!(claim.status, ClaimStatus::Issued);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runner_fulfills_end_to_end() {
    let engine = helpers::TestEngine::with_strategy("queued").await;
    let resource = engine.open_resource(5).await;
    let requester = RequesterId::new();

    let config = WorkerConfig {
        consume_wait_seconds: 1,
        ..Default::default()
    };
    let runner = FulfillmentRunner::new(
        engine.broker.clone(),
        Arc::clone(&engine.handler),
        config,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner_handle = tokio::spawn(async move { runner.run(shutdown_rx).await });

    let ticket = engine
        .claims
        .issue(&resource.id, &requester, 2)
        .await
        .expect("Issue failed");

    // The runner picks the intent up on its own; poll until it lands.
    let mut status = ClaimStatus::Pending;
    for _ in 0..100 {
        status = engine
            .claims
            .get_status(&ticket.claim_id, &requester)
            .await
            .expect("Status lookup failed")
            .status;
        if status == ClaimStatus::Issued {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, ClaimStatus::Issued);

    shutdown_tx.send(true).expect("Shutdown signal failed");
    runner_handle.await.expect("Runner panicked");

    let row = engine.resources.get(&resource.id).await.unwrap();
    assert_eq!(row.remaining_quantity, 3);
}
