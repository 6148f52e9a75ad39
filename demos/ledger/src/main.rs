//! Ledger Demo
//!
//! An in-memory ledger where every operation is a request sent through the
//! Herald mediator and every balance change is published as a notification.
//!
//! ```text
//! Transfer ──▶ Timing (open) ──▶ Validate ──▶ TransferHandler
//!                                                  │
//!                                                  ▼ publish
//! Deposited ─parent─▶ BalanceChanged ─observe_as─▶ dyn AuditEvent
//! ```
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ledger-demo
//! cargo run --package ledger-demo -- --open ada=100 --open bob=5 transfer ada bob 30
//! HERALD_LOGGING__LEVEL=debug cargo run --package ledger-demo
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herald::prelude::*;
use herald::{BoxError, BoxedMessage, HeraldRuntime};
use parking_lot::Mutex;
use tracing::{info, warn};

// ============================================================================
// Command Line
// ============================================================================

#[derive(Parser)]
#[command(version, about = "Drive an in-memory ledger through the Herald mediator")]
struct Cli {
    /// Configuration file (defaults to herald.toml in the current directory).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Configuration profile.
    #[arg(long)]
    profile: Option<String>,

    /// Accounts to open before running, as `name=balance`.
    #[arg(long = "open", value_parser = parse_opening)]
    openings: Vec<(String, u64)>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Deposit into an account.
    Deposit { account: String, amount: u64 },
    /// Move funds between two accounts.
    Transfer {
        from: String,
        to: String,
        amount: u64,
    },
    /// Print an account balance.
    Balance { account: String },
    /// Run a short scripted session (default).
    Script,
}

fn parse_opening(raw: &str) -> Result<(String, u64), String> {
    let (name, balance) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=balance, got {raw:?}"))?;
    let balance = balance
        .parse()
        .map_err(|e| format!("invalid balance {balance:?}: {e}"))?;
    Ok((name.to_string(), balance))
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Request)]
struct OpenAccount {
    account: String,
    initial: u64,
}

#[derive(Debug, Clone, Request)]
#[request(response = u64)]
struct Deposit {
    account: String,
    amount: u64,
}

#[derive(Debug, Clone, Request)]
#[request(response = Receipt)]
struct Transfer {
    from: String,
    to: String,
    amount: u64,
}

#[derive(Debug, Clone, Request)]
#[request(response = u64, name = "ledger.balance")]
struct GetBalance {
    account: String,
}

#[derive(Debug, Clone, Copy)]
struct Receipt {
    from_balance: u64,
    to_balance: u64,
}

/// Anything worth writing to the audit trail.
trait AuditEvent: Send + Sync {
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Notification)]
#[notification(observe_as(dyn AuditEvent))]
struct BalanceChanged {
    account: String,
    balance: u64,
}

impl AuditEvent for BalanceChanged {
    fn describe(&self) -> String {
        format!("{} now holds {}", self.account, self.balance)
    }
}

#[derive(Debug, Clone, Notification)]
struct Deposited {
    #[notification(parent)]
    change: BalanceChanged,
    amount: u64,
}

#[derive(Debug, Clone, Notification)]
#[notification(observe_as(dyn AuditEvent))]
struct Transferred {
    from: String,
    to: String,
    amount: u64,
}

impl AuditEvent for Transferred {
    fn describe(&self) -> String {
        format!("{} moved {} to {}", self.from, self.amount, self.to)
    }
}

// ============================================================================
// Ledger and Handlers
// ============================================================================

#[derive(Default)]
struct Ledger {
    accounts: Mutex<BTreeMap<String, u64>>,
}

impl Ledger {
    fn balance(&self, account: &str) -> Result<u64, BoxError> {
        self.accounts
            .lock()
            .get(account)
            .copied()
            .ok_or_else(|| format!("unknown account {account}").into())
    }
}

/// Handles every ledger request. Holds the mediator weakly to publish
/// balance changes without keeping it alive.
#[derive(Clone)]
struct LedgerHandlers {
    ledger: Arc<Ledger>,
    mediator: Weak<Mediator>,
}

impl LedgerHandlers {
    async fn publish<N: Notification>(&self, notification: N, cancel: &CancellationToken) {
        let Some(mediator) = self.mediator.upgrade() else {
            return;
        };
        if let Err(err) = mediator.publish(notification, cancel).await {
            warn!(error = %err, "Notification handlers failed");
        }
    }
}

#[async_trait]
impl RequestHandler<OpenAccount> for LedgerHandlers {
    async fn handle(&self, request: &OpenAccount, cancel: &CancellationToken) -> HandlerResult<Unit> {
        {
            let mut accounts = self.ledger.accounts.lock();
            if accounts.contains_key(&request.account) {
                return Err(format!("account {} already exists", request.account).into());
            }
            accounts.insert(request.account.clone(), request.initial);
        }
        let change = BalanceChanged {
            account: request.account.clone(),
            balance: request.initial,
        };
        self.publish(change, cancel).await;
        Ok(Unit)
    }
}

#[async_trait]
impl RequestHandler<Deposit> for LedgerHandlers {
    async fn handle(&self, request: &Deposit, cancel: &CancellationToken) -> HandlerResult<u64> {
        let balance = {
            let mut accounts = self.ledger.accounts.lock();
            let balance = accounts
                .get_mut(&request.account)
                .ok_or_else(|| format!("unknown account {}", request.account))?;
            *balance += request.amount;
            *balance
        };
        let deposited = Deposited {
            change: BalanceChanged {
                account: request.account.clone(),
                balance,
            },
            amount: request.amount,
        };
        self.publish(deposited, cancel).await;
        Ok(balance)
    }
}

#[async_trait]
impl RequestHandler<Transfer> for LedgerHandlers {
    async fn handle(&self, request: &Transfer, cancel: &CancellationToken) -> HandlerResult<Receipt> {
        let receipt = {
            let mut accounts = self.ledger.accounts.lock();
            let available = accounts.get(&request.from).copied().unwrap_or_default();
            if !accounts.contains_key(&request.to) {
                return Err(format!("unknown account {}", request.to).into());
            }
            if available < request.amount {
                return Err(format!(
                    "{} holds {available}, cannot move {}",
                    request.from, request.amount
                )
                .into());
            }
            let from_balance = available - request.amount;
            accounts.insert(request.from.clone(), from_balance);
            let to = accounts.entry(request.to.clone()).or_default();
            *to += request.amount;
            Receipt {
                from_balance,
                to_balance: *to,
            }
        };
        let transferred = Transferred {
            from: request.from.clone(),
            to: request.to.clone(),
            amount: request.amount,
        };
        self.publish(transferred, cancel).await;
        Ok(receipt)
    }
}

#[async_trait]
impl RequestHandler<GetBalance> for LedgerHandlers {
    async fn handle(&self, request: &GetBalance, _cancel: &CancellationToken) -> HandlerResult<u64> {
        self.ledger.balance(&request.account)
    }
}

/// Collects every audit event, whatever notification carried it.
#[derive(Clone, Default)]
struct AuditTrail(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl NotificationHandler<dyn AuditEvent> for AuditTrail {
    async fn handle(
        &self,
        event: &(dyn AuditEvent + 'static),
        _cancel: &CancellationToken,
    ) -> HandlerResult<()> {
        self.0.lock().push(event.describe());
        Ok(())
    }
}

// ============================================================================
// Behaviors
// ============================================================================

/// Logs how long each request took, for every request type.
struct Timing;

#[async_trait]
impl OpenBehavior for Timing {
    async fn handle(
        &self,
        request: &dyn Message,
        _cancel: &CancellationToken,
        next: Next<'_, AnyResponse>,
    ) -> HandlerResult<AnyResponse> {
        let started = Instant::now();
        let response = next().await;
        info!(
            request = request.message_name(),
            elapsed_us = started.elapsed().as_micros() as u64,
            ok = response.is_ok(),
            "Handled request"
        );
        response
    }
}

/// Rejects transfers that cannot be meaningful.
struct Validate;

#[async_trait]
impl PipelineBehavior<Transfer> for Validate {
    async fn handle(
        &self,
        request: &Transfer,
        _cancel: &CancellationToken,
        next: Next<'_, Receipt>,
    ) -> HandlerResult<Receipt> {
        if request.amount == 0 {
            return Err("transfer amount must be positive".into());
        }
        if request.from == request.to {
            return Err("cannot transfer to the same account".into());
        }
        next().await
    }
}

// ============================================================================
// Main
// ============================================================================

fn register(runtime: &HeraldRuntime, audit: &AuditTrail) {
    let handlers = LedgerHandlers {
        ledger: Arc::new(Ledger::default()),
        mediator: Arc::downgrade(runtime.mediator()),
    };

    runtime
        .registry()
        .open_behavior(Timing)
        .behavior(Validate)
        .request_handler::<OpenAccount>(handlers.clone())
        .request_handler::<Deposit>(handlers.clone())
        .request_handler::<Transfer>(handlers.clone())
        .request_handler::<GetBalance>(handlers)
        .notification_handler::<dyn AuditEvent>(audit.clone())
        .notification_handler::<Transferred>(notification_fn(|t: Transferred, _| async move {
            info!(from = %t.from, to = %t.to, amount = t.amount, "Transfer settled");
            Ok(())
        }));
}

async fn script(mediator: &Mediator, cancel: &CancellationToken) -> Result<()> {
    for (account, initial) in [("ada", 120), ("bob", 15)] {
        let open = OpenAccount {
            account: account.into(),
            initial,
        };
        if let Err(err) = mediator.send(open, cancel).await {
            warn!(account, error = %err, "Account not opened");
        }
    }

    mediator
        .send(
            Deposit {
                account: "bob".into(),
                amount: 10,
            },
            cancel,
        )
        .await?;

    let receipt = mediator
        .send(
            Transfer {
                from: "ada".into(),
                to: "bob".into(),
                amount: 45,
            },
            cancel,
        )
        .await?;
    info!(?receipt, "Transfer complete");

    let rejected = mediator
        .send(
            Transfer {
                from: "bob".into(),
                to: "bob".into(),
                amount: 1,
            },
            cancel,
        )
        .await;
    if let Err(err) = rejected {
        info!(error = %err, "Transfer rejected");
    }

    // Untyped dispatch, as a message bus would do it.
    let query = BoxedMessage::new(GetBalance {
        account: "ada".into(),
    });
    let balance = mediator.send_untyped(query, cancel).await?;
    let balance = balance
        .downcast_ref::<u64>()
        .context("balance query returned an unexpected type")?;
    info!(balance, "ada balance");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = HeraldRuntime::builder();
    if let Some(path) = cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = cli.profile {
        builder = builder.profile(profile);
    }
    let runtime = builder.build()?;

    let audit = AuditTrail::default();
    register(&runtime, &audit);

    let mediator = runtime.mediator();
    let cancel = CancellationToken::new();

    for (account, initial) in cli.openings {
        mediator
            .send(OpenAccount { account, initial }, &cancel)
            .await?;
    }

    match cli.command.unwrap_or(Command::Script) {
        Command::Deposit { account, amount } => {
            let balance = mediator.send(Deposit { account, amount }, &cancel).await?;
            println!("balance: {balance}");
        }
        Command::Transfer { from, to, amount } => {
            match mediator.send(Transfer { from, to, amount }, &cancel).await {
                Ok(receipt) => println!(
                    "sender: {}, recipient: {}",
                    receipt.from_balance, receipt.to_balance
                ),
                Err(err) => return Err(err).context("transfer failed"),
            }
        }
        Command::Balance { account } => {
            let balance = mediator.send(GetBalance { account }, &cancel).await?;
            println!("balance: {balance}");
        }
        Command::Script => script(mediator, &cancel).await?,
    }

    println!("audit trail:");
    for line in audit.0.lock().iter() {
        println!("  {line}");
    }
    Ok(())
}
