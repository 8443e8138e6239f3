//! `txgate simulate`: one approval round trip on a headless host
//!
//! Runs every context in-process: the background registry service, an
//! initiator awaiting the bridge, and a scripted user acting in the approval
//! window. Prints a JSON report of what the initiator observed.

use crate::settings::{load_config, AppConfig, SimulationConfig};
use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, ValueEnum};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use txgate_core::{
    channel, format_error_for_display, AccountSource, ApprovalFlowController, ApprovalRoute,
    BroadcastMode, Coin, FlowState, Msg, OnFailure, OnSuccess, Outcome, PendingRequestRegistry,
    RegistryClient, SendFlow, SendForm, SigningBridge, TxConfig, TxReceipt, TxSigner,
};
use txgate_window::{select_manager, HeadlessDesktop, PlatformVariant, WindowId, WindowSessionManager};

const WINDOW_WAIT: Duration = Duration::from_secs(5);

/// What the simulated user does in the approval window
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Decline,
    /// Close the window without deciding
    Abandon,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// What the user does in the approval window
    #[arg(long, value_enum, default_value_t = Decision::Approve)]
    pub decision: Decision,
    /// Window strategy: replace or spawn (default: simulation.variant)
    #[arg(long)]
    pub variant: Option<PlatformVariant>,
    /// Gas limit typed in the approval window
    #[arg(long, default_value = "60000")]
    pub gas: String,
    /// Fee picked in the approval window, in simulation.fee_denom
    #[arg(long, default_value_t = 1000)]
    pub fee: u64,
    /// Memo typed in the approval window
    #[arg(long)]
    pub memo: Option<String>,
    /// Open the window before the config is known and estimate it for this long
    #[arg(long, value_name = "MS")]
    pub estimate_ms: Option<u64>,
    /// Go through the send page and the signer, sending this amount
    #[arg(long, value_name = "AMOUNT")]
    pub send: Option<u64>,
}

pub async fn run(args: SimulateArgs) -> Result<()> {
    let config = load_config()?;
    let variant = match args.variant {
        Some(variant) => variant,
        None => config.simulation.variant()?,
    };

    let registry = Arc::new(PendingRequestRegistry::with_retention_secs(
        config.approval.retention_secs,
    ));
    let (service, client) = channel(registry, &config.approval);
    let shutdown = CancellationToken::new();
    let service_task = tokio::spawn(service.run(shutdown.clone()));

    let desktop = HeadlessDesktop::new(config.simulation.chrome_gap());
    let windows = select_manager(&desktop.capabilities(variant))
        .context("Headless host offers no window strategy")?;
    let bridge = SigningBridge::new(client.clone(), windows.clone(), config.approval.clone());

    info!(%variant, decision = ?args.decision, "Starting simulation");
    let initiator = tokio::spawn(initiate(bridge, args.clone(), config.simulation.clone()));

    let popup = act_in_popup(&desktop, &client, windows, &config, &args).await;
    let initiator_result = initiator.await.context("Initiator task panicked")?;

    shutdown.cancel();
    if let Err(e) = service_task.await {
        warn!(error = %e, "Registry service task failed");
    }

    let (index, outcome) = popup?;
    let report = match initiator_result {
        Ok(value) => json!({
            "variant": variant.to_string(),
            "index": index,
            "outcome": format!("{outcome:?}"),
            "result": value,
        }),
        Err(e) => json!({
            "variant": variant.to_string(),
            "index": index,
            "outcome": format!("{outcome:?}"),
            "error": e.to_string(),
            "message": format_error_for_display(&e),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// The initiator's side: wait on the bridge
async fn initiate(
    bridge: SigningBridge,
    args: SimulateArgs,
    sim: SimulationConfig,
) -> txgate_core::Result<serde_json::Value> {
    if let Some(amount) = args.send {
        let account = Arc::new(SimulatedAccount {
            balance: Coin::new(sim.balance, sim.fee_denom.clone()),
        });
        let form = SendForm {
            recipient: "cosmos1simulatedrecipient".to_string(),
            amount: Coin::new(amount, sim.fee_denom.clone()),
            memo: args.memo.unwrap_or_default(),
            fee: Some(Coin::new(args.fee, sim.fee_denom)),
            send_all: false,
        };
        let receipt = SendFlow::new(bridge, account)
            .submit(&SimulatedSigner, &form)
            .await?;
        return Ok(serde_json::to_value(receipt)?);
    }

    let initial = TxConfig::new(0u64, "");
    let config = match args.estimate_ms {
        Some(ms) => {
            bridge
                .request_approval_estimated(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok(initial)
                })
                .await?
        }
        None => bridge.request_approval(initial).await?,
    };
    Ok(serde_json::to_value(config)?)
}

/// The user's side: attach to the approval window and decide
async fn act_in_popup(
    desktop: &HeadlessDesktop,
    client: &RegistryClient,
    windows: Arc<dyn WindowSessionManager>,
    config: &AppConfig,
    args: &SimulateArgs,
) -> Result<(String, Outcome)> {
    let (window, route) = tokio::time::timeout(WINDOW_WAIT, approval_window(desktop))
        .await
        .map_err(|_| anyhow!("No approval window opened within {WINDOW_WAIT:?}"))?;
    let index = route.index.to_string();

    let mut controller = ApprovalFlowController::new(
        Arc::new(client.clone()),
        windows,
        Arc::new(desktop.page(window)),
        route,
        &config.approval,
    );
    controller.attach().await?;
    if controller.state() != &FlowState::Loaded {
        bail!("Approval window ended while attaching: {:?}", controller.state());
    }

    let outcome = match args.decision {
        Decision::Approve => {
            let denom = config.simulation.fee_denom.clone();
            controller.set_gas(&args.gas).await.map_err(user_error)?;
            if let Some(memo) = &args.memo {
                controller.set_memo(memo).await.map_err(user_error)?;
            }
            controller
                .set_fee(Coin::new(args.fee, denom))
                .await
                .map_err(user_error)?;
            controller.submit().await.map_err(user_error)?
        }
        Decision::Decline => controller
            .decline("declined in simulation")
            .await
            .map_err(user_error)?,
        Decision::Abandon => {
            desktop.user_close(window);
            drop(controller);
            Outcome::Abandoned
        }
    };

    info!(%index, ?outcome, "Simulated user finished");
    Ok((index, outcome))
}

async fn approval_window(desktop: &HeadlessDesktop) -> (WindowId, ApprovalRoute) {
    loop {
        let found = desktop
            .open_windows()
            .into_iter()
            .find_map(|w| ApprovalRoute::parse(&w.url).ok().map(|route| (w.id, route)));
        if let Some(found) = found {
            return found;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn user_error(e: txgate_core::Error) -> anyhow::Error {
    anyhow!(format_error_for_display(&e))
}

struct SimulatedAccount {
    balance: Coin,
}

#[async_trait::async_trait]
impl AccountSource for SimulatedAccount {
    fn address(&self) -> String {
        "cosmos1simulatedsender".to_string()
    }

    async fn balances(&self) -> txgate_core::Result<Vec<Coin>> {
        Ok(vec![self.balance.clone()])
    }
}

/// Signs nothing; reports an immediate commit
struct SimulatedSigner;

impl TxSigner for SimulatedSigner {
    fn sign_and_broadcast(
        &self,
        msgs: Vec<Msg>,
        config: TxConfig,
        on_success: OnSuccess,
        _on_failure: OnFailure,
        mode: BroadcastMode,
    ) {
        info!(msgs = msgs.len(), gas = %config.gas, %mode, "Simulated broadcast");
        on_success(TxReceipt {
            tx_hash: format!("{:064X}", config.gas.low_u64()),
            height: (mode == BroadcastMode::Commit).then_some(1),
        });
    }
}
