//! Send flow
//!
//! The wallet's own "send tokens" page: a bank transfer with the default
//! send gas, checked against the account's balances and submitted through
//! the [`SigningBridge`] in commit mode.

use async_trait::async_trait;
use primitive_types::U256;
use std::sync::Arc;
use tracing::{debug, info};

use crate::bridge::{BroadcastMode, Msg, SigningBridge, TxReceipt, TxSigner};
use crate::error::{Error, Result};
use crate::tx::{Coin, TxConfig, DEFAULT_SEND_GAS};


/// Account data shown on the send page
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// Bech32 address of the active account
    fn address(&self) -> String;

    /// Current balances
    async fn balances(&self) -> Result<Vec<Coin>>;
}

/// User input of the send page
#[derive(Debug, Clone, PartialEq)]
pub struct SendForm {
    /// Destination address
    pub recipient: String,
    /// Amount to send; ignored when `send_all` is set except for its denom
    pub amount: Coin,
    /// Memo
    pub memo: String,
    /// Selected fee
    pub fee: Option<Coin>,
    /// Send the whole balance of `amount.denom`, minus the fee
    pub send_all: bool,
}

/// Builds and submits bank transfers
pub struct SendFlow {
    bridge: SigningBridge,
    account: Arc<dyn AccountSource>,
}

impl SendFlow {
    /// Create the flow
    pub fn new(bridge: SigningBridge, account: Arc<dyn AccountSource>) -> Self {
        Self { bridge, account }
    }

    /// Balance held in `denom`, zero when absent
    pub async fn balance_of(&self, denom: &str) -> Result<U256> {
        let balances = self.account.balances().await?;
        Ok(balances
            .iter()
            .find(|coin| coin.denom == denom)
            .map_or_else(U256::zero, |coin| coin.amount))
    }

    /// The largest amount of `denom` that can be sent with `fee`.
    ///
    /// Zero when the fee alone exceeds the balance.
    pub async fn max_amount(&self, denom: &str, fee: Option<&Coin>) -> Result<U256> {
        let balance = self.balance_of(denom).await?;
        let fee = fee
            .filter(|fee| fee.denom == denom)
            .map_or_else(U256::zero, |fee| fee.amount);
        Ok(balance.checked_sub(fee).unwrap_or_default())
    }

    /// Validate the form and produce the message and config to approve
    pub async fn build(&self, form: &SendForm) -> Result<(Vec<Msg>, TxConfig)> {
        if form.recipient.trim().is_empty() {
            return Err(Error::config_invalid("recipient", "recipient is required"));
        }
        let Some(fee) = form.fee.clone() else {
            return Err(Error::config_invalid("fee", "fee is required"));
        };

        let denom = form.amount.denom.as_str();
        let amount = if form.send_all {
            self.max_amount(denom, Some(&fee)).await?
        } else {
            form.amount.amount
        };
        if amount.is_zero() {
            return Err(Error::config_invalid("amount", "amount is required"));
        }

        let balance = self.balance_of(denom).await?;
        let spent = if fee.denom == denom {
            amount.checked_add(fee.amount)
        } else {
            Some(amount)
        };
        if spent.map_or(true, |spent| spent > balance) {
            debug!(%denom, %balance, "Send exceeds balance");
            return Err(Error::config_invalid("amount", "insufficient funds"));
        }

        let coin = Coin::new(amount, denom);
        let msg = Msg::bank_send(&self.account.address(), form.recipient.trim(), &coin);
        let config = TxConfig::new(DEFAULT_SEND_GAS, form.memo.clone()).with_fee(fee);
        Ok((vec![msg], config))
    }

    /// Approve, sign and broadcast the transfer
    pub async fn submit(&self, signer: &dyn TxSigner, form: &SendForm) -> Result<TxReceipt> {
        let (msgs, config) = self.build(form).await?;
        info!(recipient = %form.recipient, amount = %form.amount, "Submitting send");
        self.bridge
            .send_msgs(signer, msgs, config, BroadcastMode::Commit)
            .await
    }
}
