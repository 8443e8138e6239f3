//! Integration tests for Txgate
//!
//! These tests verify the integration between the crates:
//! - txgate-window: window strategies on the headless host
//! - txgate-core: registry service, controller and bridge over the wire
//! - config/default.toml: the shipped settings drive both

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use txgate_core::{
    channel, ApprovalFlowController, ApprovalRoute, ApprovalSettings, Coin, Error,
    PendingRequestRegistry, RegistryCall, RegistryReply, ServerFrame, SigningBridge, TxConfig,
};
use txgate_window::{select_manager, HeadlessDesktop, LogicalSize, PlatformVariant, POPUP_SIZE};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

fn shipped_settings() -> ApprovalSettings {
    #[derive(serde::Deserialize)]
    struct Shipped {
        approval: ApprovalSettings,
    }
    let shipped: Shipped = toml::from_str(DEFAULT_CONFIG).unwrap();
    shipped.approval
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_shipped_settings_match_popup_size() {
    let settings = shipped_settings();
    assert_eq!(settings.popup_size(), POPUP_SIZE);
    assert_eq!(settings, ApprovalSettings::default());
}

// ============================================================================
// Wire protocol
// ============================================================================

#[test]
fn test_call_wire_format() {
    let call: RegistryCall = serde_json::from_value(json!({
        "op": "update",
        "index": "abc",
        "patch": { "gas": "0xea60" }
    }))
    .unwrap();
    assert_eq!(call.op(), "update");

    let reply = serde_json::to_value(RegistryReply::Abandoned { changed: false }).unwrap();
    assert_eq!(reply, json!({ "reply": "abandoned", "changed": false }));
}

// ============================================================================
// Full round trip
// ============================================================================

#[tokio::test]
async fn test_round_trip_with_shipped_settings() {
    let settings = ApprovalSettings {
        attach_poll_interval_ms: 1,
        ..shipped_settings()
    };
    let registry = Arc::new(PendingRequestRegistry::with_retention_secs(
        settings.retention_secs,
    ));
    let (service, client) = channel(registry, &settings);
    let shutdown = CancellationToken::new();
    let service_task = tokio::spawn(service.run(shutdown.clone()));

    let desktop = HeadlessDesktop::new(LogicalSize::new(10, 40));
    let windows = select_manager(&desktop.capabilities(PlatformVariant::ReplaceCurrent)).unwrap();
    let bridge = SigningBridge::new(client.clone(), windows.clone(), settings.clone());
    let mut frames = client.subscribe();

    let pending =
        tokio::spawn(async move { bridge.request_approval(TxConfig::new(0u64, "")).await });

    let window = loop {
        if let Some(w) = desktop.open_windows().into_iter().next() {
            break w;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    };
    assert!(window.url.starts_with(&settings.extension_base_url));
    let route = ApprovalRoute::parse(&window.url).unwrap();
    assert!(route.external);

    let mut popup = ApprovalFlowController::new(
        Arc::new(client.clone()),
        windows,
        Arc::new(desktop.page(window.id)),
        route.clone(),
        &settings,
    );
    popup.attach().await.unwrap();
    assert_eq!(desktop.window(window.id).unwrap().inner, POPUP_SIZE);

    popup.set_gas("60000").await.unwrap();
    popup.set_fee(Coin::new(1000u64, "uatom")).await.unwrap();
    popup.submit().await.unwrap();

    let config = pending.await.unwrap().unwrap();
    assert_eq!(config, TxConfig::new(60_000u64, "").with_fee(Coin::new(1000u64, "uatom")));

    // Every context saw the resolution frame
    let resolved = loop {
        if let ServerFrame::Resolved { index, resolution } = frames.next_frame().await.unwrap() {
            break (index, resolution);
        }
    };
    assert_eq!(resolved.0, route.index);

    shutdown.cancel();
    service_task.await.unwrap();

    let err = SigningBridge::new(client, select_manager(&desktop.opener_only()).unwrap(), settings)
        .request_approval(TxConfig::new(0u64, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
