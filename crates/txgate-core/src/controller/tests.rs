use super::*;
use crate::registry::{MockRegistryApi, PendingRequestRegistry, RequestState, SharedRegistry};
use crate::service::{channel, RegistryClient};
use crate::tx::Coin;
use primitive_types::U256;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use txgate_window::{select_manager, HeadlessDesktop, PlatformVariant, POPUP_SIZE};

fn fast_settings() -> ApprovalSettings {
    ApprovalSettings {
        attach_poll_interval_ms: 1,
        ..ApprovalSettings::default()
    }
}

fn fee() -> Coin {
    Coin::new(1000u64, "uatom")
}

struct Harness {
    registry: SharedRegistry,
    client: RegistryClient,
    desktop: HeadlessDesktop,
    windows: Arc<dyn WindowSessionManager>,
    _shutdown: CancellationToken,
}

impl Harness {
    fn new(variant: PlatformVariant) -> Self {
        let registry = Arc::new(PendingRequestRegistry::new());
        let (service, client) = channel(registry.clone(), &fast_settings());
        let shutdown = CancellationToken::new();
        tokio::spawn(service.run(shutdown.clone()));

        let desktop = HeadlessDesktop::new(LogicalSize::new(16, 60));
        let windows = select_manager(&desktop.capabilities(variant)).unwrap();
        Self {
            registry,
            client,
            desktop,
            windows,
            _shutdown: shutdown,
        }
    }

    /// Open an external approval window for `index` and bind a controller
    async fn open(&self, index: RequestIndex) -> (ApprovalFlowController, txgate_window::WindowId) {
        let route = ApprovalRoute::external(index);
        let session = self
            .windows
            .open(&route.to_url("popup.html"), POPUP_SIZE)
            .await
            .unwrap();
        let page = Arc::new(self.desktop.page(session.id()));
        let controller = ApprovalFlowController::new(
            Arc::new(self.client.clone()),
            self.windows.clone(),
            page,
            route,
            &fast_settings(),
        );
        (controller, session.id())
    }
}

fn mock_controller(registry: MockRegistryApi) -> ApprovalFlowController {
    let desktop = HeadlessDesktop::new(LogicalSize::new(16, 60));
    let windows = select_manager(&desktop.capabilities(PlatformVariant::SpawnSeparate)).unwrap();
    let page = Arc::new(desktop.open_page("popup.html", POPUP_SIZE));
    ApprovalFlowController::new(
        Arc::new(registry),
        windows,
        page,
        ApprovalRoute::in_app(RequestIndex::from("idx")),
        &fast_settings(),
    )
}

#[tokio::test]
async fn test_attach_retries_until_config_is_ready() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();

    let mut registry = MockRegistryApi::new();
    registry.expect_get().returning(move |index| {
        if seen.fetch_add(1, Ordering::SeqCst) < 2 {
            Err(Error::Registry(RegistryError::NotReady {
                index: index.clone(),
            }))
        } else {
            Ok(TxConfig::new(0u64, ""))
        }
    });
    registry.expect_abandon().returning(|_| Ok(true));

    let mut controller = mock_controller(registry);
    assert!(controller.is_initializing());
    controller.attach().await.unwrap();

    assert_eq!(controller.state(), &FlowState::Loaded);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(controller.config().unwrap().gas, U256::zero());
}

#[tokio::test]
async fn test_attach_unknown_index_is_inert() {
    let mut registry = MockRegistryApi::new();
    registry.expect_get().returning(|index| {
        Err(Error::Registry(RegistryError::NotFound {
            index: index.clone(),
        }))
    });
    registry.expect_abandon().never();

    let mut controller = mock_controller(registry);
    controller.attach().await.unwrap();
    assert_eq!(controller.state(), &FlowState::Done(Outcome::Invalid));

    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[tokio::test]
async fn test_invalid_config_is_refused_inline() {
    let mut registry = MockRegistryApi::new();
    registry
        .expect_get()
        .returning(|_| Ok(TxConfig::new(0u64, "")));
    registry.expect_update().returning(|_, _| Ok(()));
    registry.expect_approve().never();
    registry.expect_abandon().returning(|_| Ok(true));

    let mut controller = mock_controller(registry);
    controller.attach().await.unwrap();

    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { ref field, .. } if field == "gas"));
    assert_eq!(controller.state(), &FlowState::Loaded);

    assert!(matches!(
        controller.set_gas("lots").await,
        Err(Error::ConfigInvalid { .. })
    ));
    controller.set_gas("60000").await.unwrap();
    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, Error::ConfigInvalid { ref field, .. } if field == "fee"));
}

#[tokio::test]
async fn test_transport_failure_keeps_flow_loaded() {
    let mut registry = MockRegistryApi::new();
    registry
        .expect_get()
        .returning(|_| Ok(TxConfig::new(60_000u64, "").with_fee(fee())));
    registry
        .expect_approve()
        .times(1)
        .returning(|_, _| Err(Error::Transport("background context is gone".to_string())));
    registry.expect_abandon().returning(|_| Ok(true));

    let mut controller = mock_controller(registry);
    controller.attach().await.unwrap();

    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(controller.state(), &FlowState::Loaded);
}

#[tokio::test]
async fn test_decision_after_resolution_elsewhere() {
    let mut registry = MockRegistryApi::new();
    registry
        .expect_get()
        .returning(|_| Ok(TxConfig::new(60_000u64, "").with_fee(fee())));
    registry.expect_approve().returning(|index, _| {
        Err(Error::Registry(RegistryError::InvalidState {
            index: index.clone(),
            state: RequestState::Abandoned,
        }))
    });
    registry.expect_abandon().never();

    let mut controller = mock_controller(registry);
    controller.attach().await.unwrap();
    assert_eq!(controller.submit().await.unwrap(), Outcome::AlreadyResolved);
}

#[tokio::test]
async fn test_edit_before_load_is_rejected() {
    let mut registry = MockRegistryApi::new();
    registry.expect_update().never();
    registry.expect_abandon().returning(|_| Ok(true));

    let mut controller = mock_controller(registry);
    let err = controller.set_memo("hi").await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[tokio::test]
async fn test_external_attach_fits_and_locks_window() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let index = harness
        .client
        .create(Some(TxConfig::new(0u64, "")))
        .await
        .unwrap();
    let (mut controller, window) = harness.open(index).await;

    controller.attach().await.unwrap();

    let snapshot = harness.desktop.window(window).unwrap();
    assert_eq!(snapshot.inner, POPUP_SIZE);
    assert!(snapshot.overflow_hidden);
    assert!(!controller.route().shows_back_button());
}

#[tokio::test]
async fn test_approve_resolves_with_edited_config_and_closes_window() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let mut subscription = harness.client.subscribe();
    let index = harness
        .client
        .create(Some(TxConfig::new(0u64, "")))
        .await
        .unwrap();
    let (mut controller, window) = harness.open(index.clone()).await;

    controller.attach().await.unwrap();
    controller.set_gas("60000").await.unwrap();
    controller.set_fee(fee()).await.unwrap();
    assert_eq!(controller.submit().await.unwrap(), Outcome::Approved);

    let config = subscription
        .resolution(&index)
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(config, TxConfig::new(60_000u64, "").with_fee(fee()));
    assert!(!harness.desktop.window(window).unwrap().open);
}

#[tokio::test]
async fn test_replace_variant_leaves_window_open() {
    let harness = Harness::new(PlatformVariant::ReplaceCurrent);
    let index = harness
        .client
        .create(Some(TxConfig::new(60_000u64, "").with_fee(fee())))
        .await
        .unwrap();
    let (mut controller, window) = harness.open(index).await;

    controller.attach().await.unwrap();
    assert_eq!(controller.decline("no").await.unwrap(), Outcome::Declined);
    assert!(harness.desktop.window(window).unwrap().open);
}

#[tokio::test]
async fn test_drop_before_decision_abandons() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let mut subscription = harness.client.subscribe();
    let index = harness
        .client
        .create(Some(TxConfig::new(0u64, "")))
        .await
        .unwrap();
    let (mut controller, _window) = harness.open(index.clone()).await;
    controller.attach().await.unwrap();

    drop(controller);

    let resolution = subscription.resolution(&index).await.unwrap();
    assert!(matches!(resolution.into_result(), Err(Error::Abandoned)));
}

#[tokio::test]
async fn test_unload_and_teardown_abandon_once() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let mut subscription = harness.client.subscribe();
    let index = harness
        .client
        .create(Some(TxConfig::new(0u64, "")))
        .await
        .unwrap();
    let (mut controller, window) = harness.open(index.clone()).await;
    controller.attach().await.unwrap();

    harness.desktop.user_close(window);
    drop(controller);

    let resolution = subscription.resolution(&index).await.unwrap();
    assert_eq!(resolution.state(), RequestState::Abandoned);

    let more =
        tokio::time::timeout(Duration::from_millis(50), subscription.resolution(&index)).await;
    assert!(more.is_err());
    assert_eq!(
        harness.registry.snapshot(&index).await.unwrap().state,
        RequestState::Abandoned
    );
}

#[tokio::test]
async fn test_unload_while_attaching() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let index = harness.client.create(None).await.unwrap();
    let (mut controller, window) = harness.open(index.clone()).await;

    let attach = tokio::spawn(async move {
        controller.attach().await.unwrap();
        controller.state().clone()
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    harness.desktop.user_close(window);

    assert_eq!(attach.await.unwrap(), FlowState::Done(Outcome::Abandoned));
    assert_eq!(
        harness.registry.snapshot(&index).await.unwrap().state,
        RequestState::Abandoned
    );
}

#[tokio::test]
async fn test_back_navigation_abandons() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let index = harness
        .client
        .create(Some(TxConfig::new(0u64, "")))
        .await
        .unwrap();

    let page = Arc::new(harness.desktop.open_page("popup.html", POPUP_SIZE));
    let route = ApprovalRoute::in_app(index.clone());
    assert!(route.shows_back_button());
    let mut controller = ApprovalFlowController::new(
        Arc::new(harness.client.clone()),
        harness.windows.clone(),
        page.clone(),
        route,
        &fast_settings(),
    );

    controller.attach().await.unwrap();
    assert!(!harness.desktop.window(page.id()).unwrap().overflow_hidden);

    controller.back().await;
    assert_eq!(controller.state(), &FlowState::Done(Outcome::Abandoned));
    assert_eq!(
        harness.registry.snapshot(&index).await.unwrap().state,
        RequestState::Abandoned
    );
}

#[tokio::test]
async fn test_retarget_abandons_previous_request() {
    let harness = Harness::new(PlatformVariant::SpawnSeparate);
    let first = harness
        .client
        .create(Some(TxConfig::new(0u64, "first")))
        .await
        .unwrap();
    let second = harness
        .client
        .create(Some(TxConfig::new(0u64, "second")))
        .await
        .unwrap();

    let (mut controller, _window) = harness.open(first.clone()).await;
    controller.attach().await.unwrap();
    controller.retarget(second.clone()).await.unwrap();

    assert_eq!(controller.index(), &second);
    assert_eq!(controller.config().unwrap().memo, "second");
    assert_eq!(
        harness.registry.snapshot(&first).await.unwrap().state,
        RequestState::Abandoned
    );
    assert_eq!(
        harness.registry.snapshot(&second).await.unwrap().state,
        RequestState::AwaitingDecision
    );
}
