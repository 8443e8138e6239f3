use super::*;
use crate::event_bus::{EventBus, RegistryEvent};
use crate::tx::{Coin, TxConfig, TxConfigPatch};
use primitive_types::U256;

fn send_config() -> TxConfig {
    TxConfig::new(0u64, "")
}

fn final_config(gas: u64) -> TxConfig {
    TxConfig::new(gas, "").with_fee(Coin::new(1000u64, "uatom"))
}

#[test]
fn test_request_finish_once() {
    let mut request = PendingRequest::new(RequestIndex::from("a"), Some(send_config()));
    assert_eq!(request.state, RequestState::Created);

    assert!(request.finish(RequestState::Approved));
    assert!(!request.finish(RequestState::Rejected));
    assert_eq!(request.state, RequestState::Approved);
    assert!(request.resolved_at.is_some());
}

#[test]
fn test_resolution_into_result() {
    let approved = Resolution::Approved {
        config: final_config(1),
    };
    assert_eq!(approved.state(), RequestState::Approved);
    assert!(approved.into_result().is_ok());

    let abandoned = Resolution::Rejected {
        reason: RejectReason::Abandoned,
    };
    assert_eq!(abandoned.state(), RequestState::Abandoned);
    assert!(matches!(abandoned.into_result(), Err(crate::Error::Abandoned)));
}

#[test]
fn test_indices_are_unique() {
    assert_ne!(RequestIndex::generate(), RequestIndex::generate());
}

#[tokio::test]
async fn test_get_unknown_index_is_not_found() {
    let registry = PendingRequestRegistry::new();
    let result = registry.get(&RequestIndex::from("missing")).await;
    assert!(matches!(result, Err(RegistryError::NotFound { .. })));
}

#[tokio::test]
async fn test_get_attaches_once() {
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let registry = PendingRequestRegistry::new().with_event_bus(bus);

    let (index, _completion) = registry.create(Some(send_config())).await;
    registry.get(&index).await.unwrap();
    registry.get(&index).await.unwrap();

    let snapshot = registry.snapshot(&index).await.unwrap();
    assert_eq!(snapshot.state, RequestState::AwaitingDecision);

    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Created { .. }));
    assert!(matches!(events.recv().await.unwrap(), RegistryEvent::Attached { .. }));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_get_not_ready_until_populated() {
    let registry = PendingRequestRegistry::new();
    let (index, _completion) = registry.create(None).await;

    assert!(matches!(
        registry.get(&index).await,
        Err(RegistryError::NotReady { .. })
    ));
    assert_eq!(
        registry.snapshot(&index).await.unwrap().state,
        RequestState::Created
    );

    registry.populate(&index, send_config()).await.unwrap();
    assert_eq!(registry.get(&index).await.unwrap(), send_config());
}

#[tokio::test]
async fn test_update_requires_attach() {
    let registry = PendingRequestRegistry::new();
    let (index, _completion) = registry.create(Some(send_config())).await;

    let result = registry.update(&index, TxConfigPatch::gas(1u64)).await;
    assert!(matches!(
        result,
        Err(RegistryError::InvalidState {
            state: RequestState::Created,
            ..
        })
    ));
}

#[tokio::test]
async fn test_approve_then_reject_resolves_once() {
    let registry = PendingRequestRegistry::new();
    let (index, completion) = registry.create(Some(send_config())).await;
    registry.get(&index).await.unwrap();

    registry.approve(&index, final_config(60_000)).await.unwrap();
    let second = registry.reject(&index, "too late").await;
    assert!(matches!(
        second,
        Err(RegistryError::InvalidState {
            state: RequestState::Approved,
            ..
        })
    ));
    assert!(!registry.abandon(&index).await.unwrap());

    assert_eq!(
        completion.wait().await,
        Resolution::Approved {
            config: final_config(60_000)
        }
    );
}

#[tokio::test]
async fn test_update_after_approve_is_dropped() {
    let registry = PendingRequestRegistry::new();
    let (index, _completion) = registry.create(Some(send_config())).await;
    registry.get(&index).await.unwrap();
    registry.approve(&index, final_config(60_000)).await.unwrap();

    registry
        .update(&index, TxConfigPatch::gas(1u64))
        .await
        .unwrap();

    let stored = registry.snapshot(&index).await.unwrap().config.unwrap();
    assert_eq!(stored.gas, U256::from(60_000u64));
}

#[tokio::test]
async fn test_get_after_resolution_is_not_found() {
    let registry = PendingRequestRegistry::new();
    let (index, _completion) = registry.create(Some(send_config())).await;
    registry.get(&index).await.unwrap();
    registry.reject(&index, "no").await.unwrap();

    assert!(matches!(
        registry.get(&index).await,
        Err(RegistryError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_abandon_before_attach() {
    let registry = PendingRequestRegistry::new();
    let (index, completion) = registry.create(None).await;

    assert!(registry.abandon(&index).await.unwrap());
    assert!(!registry.abandon(&index).await.unwrap());

    let resolution = completion.wait().await;
    assert_eq!(resolution.state(), RequestState::Abandoned);
}

#[tokio::test]
async fn test_requests_are_independent() {
    let registry = PendingRequestRegistry::new();
    let (a, done_a) = registry.create(Some(send_config())).await;
    let (b, done_b) = registry.create(Some(send_config())).await;

    registry.get(&a).await.unwrap();
    registry.get(&b).await.unwrap();
    registry.update(&a, TxConfigPatch::gas(111u64)).await.unwrap();
    registry.update(&b, TxConfigPatch::memo("b")).await.unwrap();
    registry.approve(&b, final_config(222)).await.unwrap();
    registry.update(&a, TxConfigPatch::memo("a")).await.unwrap();

    assert_eq!(
        registry.snapshot(&a).await.unwrap().state,
        RequestState::AwaitingDecision
    );
    registry.approve(&a, final_config(111)).await.unwrap();

    assert_eq!(done_a.wait().await.into_result().unwrap().gas, U256::from(111u64));
    assert_eq!(done_b.wait().await.into_result().unwrap().gas, U256::from(222u64));
}

#[tokio::test]
async fn test_sweep_purges_finished_and_orphaned() {
    let registry = PendingRequestRegistry::with_retention_secs(0);

    let (finished, _keep) = registry.create(Some(send_config())).await;
    registry.abandon(&finished).await.unwrap();

    let (orphaned, completion) = registry.create(Some(send_config())).await;
    drop(completion);

    let (live, _live_completion) = registry.create(Some(send_config())).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let purged = registry.sweep().await;

    assert_eq!(purged, 2);
    assert!(registry.snapshot(&finished).await.is_none());
    assert!(registry.snapshot(&orphaned).await.is_none());
    assert!(registry.snapshot(&live).await.is_some());
    assert_eq!(registry.pending_count().await, 1);
}

#[tokio::test]
async fn test_dropped_registry_counts_as_abandoned() {
    let registry = PendingRequestRegistry::new();
    let (_index, completion) = registry.create(None).await;
    drop(registry);

    assert_eq!(completion.wait().await.state(), RequestState::Abandoned);
}

#[tokio::test]
async fn test_abandon_all_skips_finished() {
    let registry = PendingRequestRegistry::new();
    let (done, _done_rx) = registry.create(Some(send_config())).await;
    registry.get(&done).await.unwrap();
    registry.approve(&done, final_config(1)).await.unwrap();

    let (waiting, completion) = registry.create(None).await;
    assert_eq!(registry.abandon_all().await, 1);
    assert_eq!(registry.pending_count().await, 0);
    assert_eq!(completion.wait().await.state(), RequestState::Abandoned);
    assert_eq!(
        registry.snapshot(&done).await.unwrap().state,
        RequestState::Approved
    );
    assert!(!registry.abandon(&waiting).await.unwrap());
}

#[tokio::test]
async fn test_status_reports_stored_resolution() {
    let registry = PendingRequestRegistry::with_retention_secs(0);
    let (index, _completion) = registry.create(Some(send_config())).await;
    assert_eq!(registry.status(&index).await.unwrap(), None);

    registry.get(&index).await.unwrap();
    registry.reject(&index, "wrong fee").await.unwrap();
    assert_eq!(
        registry.status(&index).await.unwrap(),
        Some(Resolution::Rejected {
            reason: RejectReason::Declined {
                reason: "wrong fee".to_string()
            }
        })
    );

    registry.sweep().await;
    assert!(matches!(
        registry.status(&index).await,
        Err(RegistryError::NotFound { .. })
    ));
}
